//! The completion capability consumed by persona and routing agents.
//!
//! Any text-generation backend implements [`CompletionProvider`]; the HTTP
//! adapters live in [`crate::llm`], the offline [`NullCompletionProvider`]
//! here, and a scripted test double in [`crate::mock`].

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::{self, Stream};

use crate::error::ChatResult;
use crate::types::{Message, MessageRole};

/// Stream of incremental text fragments.
///
/// Forward-only and consumed once; dropping it releases whatever
/// connection backs it.
pub type TextStream = Pin<Box<dyn Stream<Item = ChatResult<String>> + Send>>;

/// One call to the completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System instructions, sent separately from the history
    pub system: Option<String>,
    /// Ordered message history
    pub messages: Vec<Message>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    /// Admissible answers for a classification request
    ///
    /// Real providers rely on the prompt to constrain the answer; offline
    /// providers pick the first entry so routing stays deterministic.
    pub choices: Vec<String>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, temperature: f64) -> Self {
        Self {
            system: None,
            messages: Vec::new(),
            model: model.into(),
            temperature,
            max_tokens: None,
            choices: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_choices(mut self, choices: Vec<String>) -> Self {
        self.choices = choices;
        self
    }
}

/// A text-generation backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    /// Produce the whole completion at once.
    async fn complete(&self, request: &CompletionRequest) -> ChatResult<String>;

    /// Produce the completion as a stream of fragments.
    async fn stream(&self, request: &CompletionRequest) -> ChatResult<TextStream>;
}

/// Offline provider returning deterministic replies.
///
/// Selected when no credentials are configured and fallback mode is on, so
/// demos and tests run without a live model.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCompletionProvider;

impl NullCompletionProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CompletionProvider for NullCompletionProvider {
    fn name(&self) -> &str {
        "null"
    }

    async fn complete(&self, request: &CompletionRequest) -> ChatResult<String> {
        if let Some(choice) = request.choices.first() {
            return Ok(choice.clone());
        }
        Ok(fallback_reply(&request.messages).to_string())
    }

    async fn stream(&self, request: &CompletionRequest) -> ChatResult<TextStream> {
        Ok(word_stream(fallback_reply(&request.messages)))
    }
}

const FALLBACK_GREETING: &str =
    "Hello! How can I help you today? I'm running in offline mode, so my answers are canned.";
const FALLBACK_TEST: &str = "This is a test response from the offline discovery agent.";
const FALLBACK_DEFAULT: &str = "This is a fallback response. The language model service is not available in this environment, so I can't give a real answer right now.";

/// The deterministic reply for a history, keyed on its last user turn.
pub fn fallback_reply(messages: &[Message]) -> &'static str {
    let last_user = messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::User)
        .map(|m| m.content.to_lowercase());

    match last_user {
        Some(text) if text.contains("hello") || text.trim() == "hi" => FALLBACK_GREETING,
        Some(text) if text.contains("test") => FALLBACK_TEST,
        _ => FALLBACK_DEFAULT,
    }
}

/// Stream a text word by word; the fragments concatenate back to the text
/// with whitespace runs collapsed to single spaces.
pub fn word_stream(text: &str) -> TextStream {
    let fragments: Vec<ChatResult<String>> = text
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            if i == 0 {
                Ok(word.to_string())
            } else {
                Ok(format!(" {}", word))
            }
        })
        .collect();
    Box::pin(stream::iter(fragments))
}
