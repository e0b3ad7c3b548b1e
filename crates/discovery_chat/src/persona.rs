//! Leaf agents: a system prompt bound to model parameters.

use discovery_config::{AgentDefinition, AgentKind, ConfigError};
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::completion::{fallback_reply, word_stream, CompletionProvider, CompletionRequest, TextStream};
use crate::error::ChatResult;
use crate::prompt::{build_system_prompt, PromptLoader};
use crate::types::Conversation;

/// A persona-grounded agent that answers directly.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonaAgent {
    id: String,
    kind: AgentKind,
    model: String,
    temperature: f64,
    system_prompt: String,
}

impl PersonaAgent {
    /// Build from a leaf definition, loading persona and documents.
    pub fn from_definition(
        definition: &AgentDefinition,
        loader: &dyn PromptLoader,
        guardrails: &str,
    ) -> ChatResult<Self> {
        if definition.is_routing() {
            return Err(ConfigError::invalid(
                format!("agents.{}", definition.id),
                "a routing agent cannot answer directly",
            )
            .into());
        }

        let persona = loader.load(&definition.persona)?;
        let documents = definition
            .documents
            .iter()
            .map(|reference| loader.load(reference))
            .collect::<ChatResult<Vec<_>>>()?;

        debug!(
            agent = %definition.id,
            documents = documents.len(),
            "Built persona system prompt"
        );

        Ok(Self::new(
            &definition.id,
            definition.kind,
            &definition.model,
            definition.temperature,
            build_system_prompt(&persona, guardrails, &documents),
        ))
    }

    pub fn new(
        id: impl Into<String>,
        kind: AgentKind,
        model: impl Into<String>,
        temperature: f64,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            model: model.into(),
            temperature,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// The completion request for a conversation.
    pub fn request(&self, conversation: &Conversation) -> CompletionRequest {
        CompletionRequest::new(&self.model, self.temperature)
            .with_system(&self.system_prompt)
            .with_messages(conversation.messages().to_vec())
    }

    /// Open a fresh reply stream for the conversation.
    ///
    /// With `fallback` set, a provider that cannot open a stream, or whose
    /// stream fails before the first fragment, yields the deterministic
    /// offline reply instead of an error. Failures after text has been
    /// produced always reach the caller.
    pub async fn respond(
        &self,
        conversation: &Conversation,
        provider: &dyn CompletionProvider,
        fallback: bool,
    ) -> ChatResult<TextStream> {
        let request = self.request(conversation);

        let mut reply = match provider.stream(&request).await {
            Ok(reply) if !fallback => return Ok(reply),
            Ok(reply) => reply,
            Err(e) if fallback => return Ok(self.fallback(conversation, provider, &e)),
            Err(e) => return Err(e),
        };

        match reply.next().await {
            Some(Ok(first)) => Ok(Box::pin(stream::once(async move { Ok(first) }).chain(reply))),
            Some(Err(e)) => Ok(self.fallback(conversation, provider, &e)),
            None => Ok(reply),
        }
    }

    fn fallback(
        &self,
        conversation: &Conversation,
        provider: &dyn CompletionProvider,
        error: &dyn std::fmt::Display,
    ) -> TextStream {
        warn!(
            agent = %self.id,
            provider = provider.name(),
            error = %error,
            "Completion unavailable, answering with fallback text"
        );
        word_stream(fallback_reply(conversation.messages()))
    }
}
