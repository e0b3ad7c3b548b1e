//! The chat service: "handle the next user message for agent X".

use std::sync::Arc;

use discovery_config::{AgentCatalog, ProviderKind, RuntimeSettings};
use tracing::{debug, info, warn};

use crate::completion::{CompletionProvider, NullCompletionProvider};
use crate::error::{ChatError, ChatResult};
use crate::llm::{LlmAdapter, LlmProvider};
use crate::registry::AgentRegistry;
use crate::router::{RoutePlan, RoutingDispatcher};
use crate::stream::ReplyStream;
use crate::types::Conversation;

/// Stateless request handler shared by every session.
///
/// Holds the immutable registry and the completion provider; conversations
/// are owned by callers and passed in per request.
#[derive(Clone)]
pub struct ChatService {
    registry: Arc<AgentRegistry>,
    provider: Arc<dyn CompletionProvider>,
    dispatcher: RoutingDispatcher,
    fallback: bool,
}

impl ChatService {
    /// Create a service with default routing limits and fallback enabled.
    pub fn new(registry: Arc<AgentRegistry>, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            registry,
            provider,
            dispatcher: RoutingDispatcher::default(),
            fallback: true,
        }
    }

    /// Create a service configured from runtime settings.
    pub fn from_settings(registry: Arc<AgentRegistry>, settings: &RuntimeSettings) -> ChatResult<Self> {
        let provider = Self::select_provider(settings)?;
        Ok(Self::new(registry, provider)
            .with_dispatcher(RoutingDispatcher::from_settings(settings))
            .with_fallback(settings.fallback))
    }

    /// Pick the completion provider the settings ask for.
    ///
    /// Missing credentials select the offline provider when fallback is on
    /// and fail with [`ChatError::LlmNotConfigured`] otherwise.
    pub fn select_provider(settings: &RuntimeSettings) -> ChatResult<Arc<dyn CompletionProvider>> {
        let adapter = match settings.provider {
            ProviderKind::Null => {
                info!("Using offline completion provider");
                return Ok(Arc::new(NullCompletionProvider::new()));
            }
            ProviderKind::Auto => LlmAdapter::from_env(),
            ProviderKind::OpenAI => LlmAdapter::for_provider(LlmProvider::OpenAI),
            ProviderKind::Anthropic => LlmAdapter::for_provider(LlmProvider::Anthropic),
        };

        match adapter {
            Ok(adapter) => {
                info!("Using {} completion provider", adapter.provider().as_str());
                Ok(Arc::new(adapter))
            }
            Err(ChatError::LlmNotConfigured) if settings.fallback => {
                warn!("No LLM credentials configured, answering with fallback text");
                Ok(Arc::new(NullCompletionProvider::new()))
            }
            Err(e) => Err(e),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: RoutingDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &AgentCatalog {
        self.registry.catalog()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn fallback(&self) -> bool {
        self.fallback
    }

    pub fn dispatcher(&self) -> &RoutingDispatcher {
        &self.dispatcher
    }

    /// Work out which leaf agent would answer, without generating a reply.
    pub async fn resolve(&self, agent_id: &str, conversation: &Conversation) -> ChatResult<RoutePlan> {
        self.dispatcher
            .resolve(self.registry.catalog(), agent_id, conversation, self.provider.as_ref())
            .await
    }

    /// Route the conversation and open the answering agent's reply stream.
    ///
    /// The conversation is only read; callers append the user turn before
    /// and the assistant turn after.
    pub async fn handle(&self, agent_id: &str, conversation: &Conversation) -> ChatResult<ReplyStream> {
        let plan = self.resolve(agent_id, conversation).await?;
        let persona = self.registry.persona(&plan.leaf)?;

        debug!(
            agent = %agent_id,
            leaf = %plan.leaf,
            provider = self.provider.name(),
            "Opening reply stream"
        );
        let inner = persona
            .respond(conversation, self.provider.as_ref(), self.fallback)
            .await?;
        Ok(ReplyStream::new(plan, inner))
    }
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("registry", &self.registry)
            .field("provider", &self.provider.name())
            .field("dispatcher", &self.dispatcher)
            .field("fallback", &self.fallback)
            .finish()
    }
}
