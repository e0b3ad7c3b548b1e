//! Error types for the chat system.

use discovery_config::ConfigError;
use thiserror::Error;

/// Result type for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Chat system errors
///
/// Request-time failures fall into two families that callers retry
/// differently: [`ChatError::is_ambiguous`] (rephrase or fall back to a
/// default agent) and [`ChatError::is_retryable`] (back off and retry).
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Agent `{0}` is not available to this session")]
    AgentUnavailable(String),

    #[error("Failed to load prompt `{reference}`: {source}")]
    PromptLoad {
        reference: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Routing agent `{agent}` answered `{output}`, which matches none of: {}",
        .labels.join(", ")
    )]
    RoutingAmbiguous {
        agent: String,
        output: String,
        labels: Vec<String>,
    },

    #[error(
        "Routing from `{agent}` exceeded {max_hops} hop(s): {}",
        .path.join(" -> ")
    )]
    RoutingDepthExceeded {
        agent: String,
        max_hops: usize,
        path: Vec<String>,
    },

    #[error("Classification failed for routing agent `{agent}`: {source}")]
    ClassificationFailure {
        agent: String,
        #[source]
        source: Box<ChatError>,
    },

    #[error("LLM not configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY")]
    LlmNotConfigured,

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("LLM API error {status}: {body}")]
    LlmStatus { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Wrap a completion failure raised while classifying.
    pub fn classification(agent: impl Into<String>, source: ChatError) -> Self {
        Self::ClassificationFailure {
            agent: agent.into(),
            source: Box::new(source),
        }
    }

    /// Classifier output matched no declared label.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::RoutingAmbiguous { .. })
    }

    /// Transient infrastructure fault worth a backoff-retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::LlmError(_) => true,
            Self::LlmStatus { status, .. } => *status == 429 || *status >= 500,
            Self::ClassificationFailure { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Failure of the completion service rather than of routing or configuration.
    pub fn is_completion_failure(&self) -> bool {
        matches!(
            self,
            Self::LlmNotConfigured
                | Self::LlmError(_)
                | Self::LlmStatus { .. }
                | Self::ClassificationFailure { .. }
        )
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::LlmError(format!("Malformed response: {}", err))
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        Self::LlmError(format!("Network error: {}", err))
    }
}
