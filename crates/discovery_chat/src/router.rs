//! Conditional routing between agents.
//!
//! A routing agent asks the completion provider to classify the recent
//! conversation into one of its declared labels and hands the turn to the
//! matching target. Targets may route again; the chain is walked with an
//! explicit hop counter until a leaf agent is reached.

use discovery_config::{
    normalize_label, AgentCatalog, AgentDefinition, Route, RoutingSpec, RuntimeSettings,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::completion::{CompletionProvider, CompletionRequest};
use crate::error::{ChatError, ChatResult};
use crate::prompt::render_condition;
use crate::types::{Conversation, Message};

/// One classification step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteHop {
    /// Routing agent that classified
    pub agent: String,
    /// Declared label that matched
    pub label: String,
    /// Agent the turn was handed to
    pub target: String,
}

/// Outcome of resolving a start agent down to a leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutePlan {
    pub start: String,
    pub leaf: String,
    pub hops: Vec<RouteHop>,
}

impl RoutePlan {
    /// Agents visited, start first.
    pub fn path(&self) -> Vec<&str> {
        std::iter::once(self.start.as_str())
            .chain(self.hops.iter().map(|h| h.target.as_str()))
            .collect()
    }

    /// True when the start agent answered without routing.
    pub fn is_direct(&self) -> bool {
        self.hops.is_empty()
    }
}

/// Stateless dispatcher resolving routing chains.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDispatcher {
    max_hops: usize,
    temperature: f64,
    window: usize,
    max_tokens: u32,
}

impl Default for RoutingDispatcher {
    fn default() -> Self {
        Self::from_settings(&RuntimeSettings::default())
    }
}

impl RoutingDispatcher {
    pub fn new(max_hops: usize) -> Self {
        Self {
            max_hops,
            ..Self::default()
        }
    }

    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self {
            max_hops: settings.max_route_hops,
            temperature: settings.classification_temperature,
            window: settings.classification_window,
            max_tokens: settings.classification_max_tokens,
        }
    }

    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    /// Resolve `start` to the leaf agent that should answer.
    pub async fn resolve(
        &self,
        catalog: &AgentCatalog,
        start: &str,
        conversation: &Conversation,
        provider: &dyn CompletionProvider,
    ) -> ChatResult<RoutePlan> {
        let mut current = catalog
            .get(start)
            .ok_or_else(|| ChatError::AgentNotFound(start.to_string()))?;
        let mut hops: Vec<RouteHop> = Vec::new();

        loop {
            let Some(routing) = current.routing.as_ref() else {
                let plan = RoutePlan {
                    start: start.to_string(),
                    leaf: current.id.clone(),
                    hops,
                };
                if !plan.is_direct() {
                    info!(
                        start = %plan.start,
                        leaf = %plan.leaf,
                        hops = plan.hops.len(),
                        "Routed conversation"
                    );
                }
                return Ok(plan);
            };

            if hops.len() >= self.max_hops {
                let mut path = vec![start.to_string()];
                path.extend(hops.into_iter().map(|h| h.target));
                return Err(ChatError::RoutingDepthExceeded {
                    agent: start.to_string(),
                    max_hops: self.max_hops,
                    path,
                });
            }

            let output = self.classify(current, routing, conversation, provider).await?;
            let route = match_label(&current.id, routing, &output)?;

            debug!(
                agent = %current.id,
                decision = %output.trim(),
                target = %route.target,
                hop = hops.len() + 1,
                "Routing hop"
            );
            hops.push(RouteHop {
                agent: current.id.clone(),
                label: route.label.clone(),
                target: route.target.clone(),
            });

            current = catalog
                .get(&route.target)
                .ok_or_else(|| ChatError::AgentNotFound(route.target.clone()))?;
        }
    }

    /// The classification request for one routing agent.
    ///
    /// The rendered condition is sent as the sole user message; the routing
    /// agent's persona is not part of it.
    pub fn classification_request(
        &self,
        definition: &AgentDefinition,
        routing: &RoutingSpec,
        conversation: &Conversation,
    ) -> CompletionRequest {
        let prompt = render_condition(&routing.condition, &conversation.transcript(self.window));

        CompletionRequest::new(&definition.model, self.temperature)
            .with_messages(vec![Message::user(prompt)])
            .with_max_tokens(self.max_tokens)
            .with_choices(routing.labels().into_iter().map(str::to_string).collect())
    }

    async fn classify(
        &self,
        definition: &AgentDefinition,
        routing: &RoutingSpec,
        conversation: &Conversation,
        provider: &dyn CompletionProvider,
    ) -> ChatResult<String> {
        let request = self.classification_request(definition, routing, conversation);
        provider
            .complete(&request)
            .await
            .map_err(|e| ChatError::classification(&definition.id, e))
    }
}

/// Find the route whose label equals the normalized classifier output.
pub fn match_label<'a>(agent: &str, routing: &'a RoutingSpec, output: &str) -> ChatResult<&'a Route> {
    let decision = normalize_label(output);
    routing
        .routes
        .iter()
        .find(|route| route.normalized_label() == decision)
        .ok_or_else(|| ChatError::RoutingAmbiguous {
            agent: agent.to_string(),
            output: output.trim().to_string(),
            labels: routing.labels().into_iter().map(str::to_string).collect(),
        })
}
