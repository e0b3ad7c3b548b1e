//! HTTP completion providers.
//!
//! Supports OpenAI-compatible and Anthropic APIs, selected via environment
//! variables. Both stream over server-sent events; neither retries.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::completion::{CompletionProvider, CompletionRequest, TextStream};
use crate::error::{ChatError, ChatResult};
use crate::sse::{sse_text_stream, SseChunk};
use crate::types::MessageRole;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 4096;
const ANTHROPIC_MAX_TEMPERATURE: f64 = 1.0;

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Anthropic,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    fn key_var(&self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

/// Completion provider backed by a hosted LLM API
pub struct LlmAdapter {
    provider: LlmProvider,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for LlmAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmAdapter")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl LlmAdapter {
    /// Create a new adapter against the provider's public endpoint
    pub fn new(provider: LlmProvider, api_key: impl Into<String>) -> Self {
        let base_url = match provider {
            LlmProvider::OpenAI => OPENAI_BASE_URL,
            LlmProvider::Anthropic => ANTHROPIC_BASE_URL,
        };

        Self {
            provider,
            api_key: api_key.into(),
            base_url: base_url.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the adapter at a compatible endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Create an adapter from environment variables
    ///
    /// Checks in order:
    /// 1. OPENAI_API_KEY (with OPENAI_BASE_URL when set)
    /// 2. ANTHROPIC_API_KEY
    pub fn from_env() -> ChatResult<Self> {
        Self::from_vars(None, |key| std::env::var(key).ok())
    }

    /// Create an adapter for one provider, requiring its key
    pub fn for_provider(provider: LlmProvider) -> ChatResult<Self> {
        Self::from_vars(Some(provider), |key| std::env::var(key).ok())
    }

    /// Resolve credentials from an arbitrary variable source
    pub fn from_vars(
        preferred: Option<LlmProvider>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ChatResult<Self> {
        let candidates = match preferred {
            Some(provider) => vec![provider],
            None => vec![LlmProvider::OpenAI, LlmProvider::Anthropic],
        };

        for provider in candidates {
            let Some(api_key) = lookup(provider.key_var()).filter(|k| !k.trim().is_empty()) else {
                continue;
            };
            let adapter = Self::new(provider, api_key);
            if provider == LlmProvider::OpenAI {
                if let Some(url) = lookup("OPENAI_BASE_URL").filter(|u| !u.trim().is_empty()) {
                    return Ok(adapter.with_base_url(url));
                }
            }
            return Ok(adapter);
        }

        Err(ChatError::LlmNotConfigured)
    }

    /// Get the current provider
    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        match self.provider {
            LlmProvider::OpenAI => format!("{}/chat/completions", self.base_url),
            LlmProvider::Anthropic => format!("{}/messages", self.base_url),
        }
    }

    async fn send(&self, request: &CompletionRequest, stream: bool) -> ChatResult<reqwest::Response> {
        debug!(
            provider = self.provider.as_str(),
            model = %request.model,
            messages = request.messages.len(),
            stream,
            "Sending completion request"
        );

        let builder = self.client.post(self.endpoint());
        let builder = match self.provider {
            LlmProvider::OpenAI => builder
                .bearer_auth(&self.api_key)
                .json(&openai_request(request, stream)),
            LlmProvider::Anthropic => builder
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&anthropic_request(request, stream)),
        };

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::LlmStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl CompletionProvider for LlmAdapter {
    fn name(&self) -> &str {
        self.provider.as_str()
    }

    async fn complete(&self, request: &CompletionRequest) -> ChatResult<String> {
        let response = self.send(request, false).await?;

        match self.provider {
            LlmProvider::OpenAI => {
                let result: OpenAIResponse = response.json().await?;
                result
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content.unwrap_or_default())
                    .ok_or_else(|| ChatError::LlmError("No response from OpenAI".to_string()))
            }
            LlmProvider::Anthropic => {
                let result: AnthropicResponse = response.json().await?;
                let text: String = result
                    .content
                    .into_iter()
                    .filter_map(|c| c.text)
                    .collect();
                if text.is_empty() {
                    return Err(ChatError::LlmError("No response from Anthropic".to_string()));
                }
                Ok(text)
            }
        }
    }

    async fn stream(&self, request: &CompletionRequest) -> ChatResult<TextStream> {
        let response = self.send(request, true).await?;
        let bytes = response.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec()));

        let parse: fn(&str) -> ChatResult<SseChunk> = match self.provider {
            LlmProvider::OpenAI => parse_openai_chunk,
            LlmProvider::Anthropic => parse_anthropic_chunk,
        };
        Ok(sse_text_stream(bytes, parse))
    }
}

fn openai_request(request: &CompletionRequest, stream: bool) -> OpenAIRequest {
    let system = request
        .system
        .iter()
        .map(|content| OpenAIMessage {
            role: MessageRole::System.as_str(),
            content: content.clone(),
        });
    let history = request.messages.iter().map(|m| OpenAIMessage {
        role: m.role.as_str(),
        content: m.content.clone(),
    });

    OpenAIRequest {
        model: request.model.clone(),
        messages: system.chain(history).collect(),
        temperature: request.temperature,
        max_completion_tokens: request.max_tokens,
        stream,
    }
}

fn anthropic_request(request: &CompletionRequest, stream: bool) -> AnthropicRequest {
    // Anthropic requires system text outside the message list
    let system_parts: Vec<&str> = request
        .system
        .as_deref()
        .into_iter()
        .chain(
            request
                .messages
                .iter()
                .filter(|m| m.role == MessageRole::System)
                .map(|m| m.content.as_str()),
        )
        .collect();

    AnthropicRequest {
        model: request.model.clone(),
        max_tokens: request.max_tokens.unwrap_or(ANTHROPIC_MAX_TOKENS),
        temperature: request.temperature.min(ANTHROPIC_MAX_TEMPERATURE),
        system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
        messages: request
            .messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| AnthropicMessage {
                role: m.role.as_str(),
                content: m.content.clone(),
            })
            .collect(),
        stream,
    }
}

/// Interpret one OpenAI `data:` payload.
pub fn parse_openai_chunk(data: &str) -> ChatResult<SseChunk> {
    if data.trim() == "[DONE]" {
        return Ok(SseChunk::Done);
    }
    let chunk: OpenAIStreamChunk = serde_json::from_str(data)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .map(SseChunk::Text)
        .unwrap_or(SseChunk::Skip))
}

/// Interpret one Anthropic `data:` payload.
pub fn parse_anthropic_chunk(data: &str) -> ChatResult<SseChunk> {
    match serde_json::from_str::<AnthropicEvent>(data)? {
        AnthropicEvent::ContentBlockDelta { delta } => {
            Ok(delta.text.map(SseChunk::Text).unwrap_or(SseChunk::Skip))
        }
        AnthropicEvent::MessageStop => Ok(SseChunk::Done),
        AnthropicEvent::Error { error } => Err(ChatError::LlmError(format!(
            "Anthropic stream error ({}): {}",
            error.error_type, error.message
        ))),
        AnthropicEvent::Other => Ok(SseChunk::Skip),
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIDelta,
}

#[derive(Debug, Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicEvent {
    ContentBlockDelta {
        delta: AnthropicDelta,
    },
    MessageStop,
    Error {
        error: AnthropicStreamError,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicDelta {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicStreamError {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new("gpt-4o", 1.5)
            .with_system("You are a facilitator.")
            .with_messages(vec![Message::user("hello"), Message::assistant("hi!")])
    }

    #[test]
    fn test_provider_detection() {
        assert!(matches!(
            LlmAdapter::from_vars(None, vars(&[])),
            Err(ChatError::LlmNotConfigured)
        ));

        let adapter = LlmAdapter::from_vars(None, vars(&[("OPENAI_API_KEY", "k")])).unwrap();
        assert_eq!(adapter.provider(), LlmProvider::OpenAI);

        let adapter = LlmAdapter::from_vars(
            None,
            vars(&[("OPENAI_API_KEY", " "), ("ANTHROPIC_API_KEY", "k")]),
        )
        .unwrap();
        assert_eq!(adapter.provider(), LlmProvider::Anthropic);

        assert!(LlmAdapter::from_vars(
            Some(LlmProvider::Anthropic),
            vars(&[("OPENAI_API_KEY", "k")])
        )
        .is_err());
    }

    #[test]
    fn test_openai_base_url_override() {
        let adapter = LlmAdapter::from_vars(
            None,
            vars(&[
                ("OPENAI_API_KEY", "k"),
                ("OPENAI_BASE_URL", "http://localhost:8080/v1/"),
            ]),
        )
        .unwrap();
        assert_eq!(adapter.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert!(!format!("{:?}", adapter).contains("\"k\""));
    }

    #[test]
    fn test_openai_request_puts_system_first() {
        let body = serde_json::to_value(openai_request(&request(), true)).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["messages"].as_array().unwrap().len(), 3);
        assert_eq!(body["stream"], true);
        assert!(body.get("max_completion_tokens").is_none());

        let body = serde_json::to_value(openai_request(&request(), false)).unwrap();
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn test_anthropic_request_separates_system_and_clamps() {
        let body = serde_json::to_value(anthropic_request(&request(), false)).unwrap();
        assert_eq!(body["system"], "You are a facilitator.");
        assert_eq!(body["temperature"], 1.0);
        assert_eq!(body["max_tokens"], 4096);
        assert!(body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .all(|m| m["role"] != "system"));
    }

    #[test]
    fn test_parse_openai_chunks() {
        let data = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_openai_chunk(data).unwrap(), SseChunk::Text("Hel".to_string()));
        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_openai_chunk(role_only).unwrap(), SseChunk::Skip);
        assert_eq!(parse_openai_chunk("[DONE]").unwrap(), SseChunk::Done);
        assert!(parse_openai_chunk("{not json").is_err());
    }

    #[test]
    fn test_parse_anthropic_chunks() {
        let delta = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#;
        assert_eq!(parse_anthropic_chunk(delta).unwrap(), SseChunk::Text("Hi".to_string()));
        assert_eq!(
            parse_anthropic_chunk(r#"{"type":"ping"}"#).unwrap(),
            SseChunk::Skip
        );
        assert_eq!(
            parse_anthropic_chunk(r#"{"type":"message_stop"}"#).unwrap(),
            SseChunk::Done
        );
        let error = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let err = parse_anthropic_chunk(error).unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("overloaded_error"));
    }
}
