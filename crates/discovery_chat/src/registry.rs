//! Agent registry: one runtime object per configured agent.

use std::collections::HashMap;
use std::sync::Arc;

use discovery_config::{AgentCatalog, AgentDefinition, AgentKind, ConfigError};
use tracing::{debug, info};

use crate::error::{ChatError, ChatResult};
use crate::persona::PersonaAgent;
use crate::prompt::{PromptLoader, DEFAULT_GUARDRAILS};

/// A routing agent with its loaded persona text.
///
/// The persona is kept for display; classification uses only the condition.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingAgent {
    definition: AgentDefinition,
    persona: String,
}

impl RoutingAgent {
    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }
}

/// Runtime form of a configured agent.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentRuntime {
    Persona(PersonaAgent),
    Routing(RoutingAgent),
}

impl AgentRuntime {
    pub fn id(&self) -> &str {
        match self {
            Self::Persona(agent) => agent.id(),
            Self::Routing(agent) => &agent.definition.id,
        }
    }

    pub fn kind(&self) -> AgentKind {
        match self {
            Self::Persona(agent) => agent.kind(),
            Self::Routing(_) => AgentKind::Routing,
        }
    }

    pub fn is_routing(&self) -> bool {
        matches!(self, Self::Routing(_))
    }

    pub fn as_persona(&self) -> Option<&PersonaAgent> {
        match self {
            Self::Persona(agent) => Some(agent),
            Self::Routing(_) => None,
        }
    }
}

/// Immutable registry built once from a catalog.
///
/// Every prompt and document is loaded up front, so a missing file fails
/// startup rather than a request.
pub struct AgentRegistry {
    catalog: Arc<AgentCatalog>,
    agents: HashMap<String, Arc<AgentRuntime>>,
    guardrails: String,
}

impl AgentRegistry {
    /// Load every agent in the catalog.
    ///
    /// `guardrails` overrides the catalog's guardrails reference; with
    /// neither, the built-in guardrail lines are used.
    pub fn build(
        catalog: Arc<AgentCatalog>,
        loader: &dyn PromptLoader,
        guardrails: Option<&str>,
    ) -> ChatResult<Self> {
        let guardrails = match guardrails.or(catalog.guardrails()) {
            Some(reference) => {
                debug!("Loading guardrails from {}", reference);
                loader.load(reference)?
            }
            None => DEFAULT_GUARDRAILS.to_string(),
        };

        let mut agents = HashMap::with_capacity(catalog.len());
        for definition in catalog.agents() {
            let runtime = if definition.is_routing() {
                debug!("Registering routing agent: {}", definition.id);
                AgentRuntime::Routing(RoutingAgent {
                    definition: definition.clone(),
                    persona: loader.load(&definition.persona)?,
                })
            } else {
                debug!("Registering persona agent: {}", definition.id);
                AgentRuntime::Persona(PersonaAgent::from_definition(definition, loader, &guardrails)?)
            };
            agents.insert(definition.id.clone(), Arc::new(runtime));
        }

        info!("Loaded {} agent(s)", agents.len());
        Ok(Self {
            catalog,
            agents,
            guardrails,
        })
    }

    /// Get an agent by identifier.
    pub fn get(&self, id: &str) -> Option<Arc<AgentRuntime>> {
        self.agents.get(id).cloned()
    }

    /// Get an agent by identifier, returning an error if not found.
    pub fn get_required(&self, id: &str) -> ChatResult<Arc<AgentRuntime>> {
        self.get(id)
            .ok_or_else(|| ChatError::AgentNotFound(id.to_string()))
    }

    /// The leaf agent registered under `id`.
    pub fn persona(&self, id: &str) -> ChatResult<&PersonaAgent> {
        let runtime = self
            .agents
            .get(id)
            .ok_or_else(|| ChatError::AgentNotFound(id.to_string()))?;
        runtime.as_persona().ok_or_else(|| {
            ConfigError::invalid(format!("agents.{}", id), "a routing agent cannot answer directly").into()
        })
    }

    pub fn definition(&self, id: &str) -> Option<&AgentDefinition> {
        self.catalog.get(id)
    }

    pub fn catalog(&self) -> &AgentCatalog {
        &self.catalog
    }

    /// Shared handle to the catalog.
    pub fn catalog_arc(&self) -> Arc<AgentCatalog> {
        self.catalog.clone()
    }

    /// Guardrail text appended to every persona.
    pub fn guardrails(&self) -> &str {
        &self.guardrails
    }

    pub fn contains(&self, id: &str) -> bool {
        self.agents.contains_key(id)
    }

    /// Agent identifiers in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.catalog.ids()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::StaticPromptLoader;
    use discovery_config::ConfigLoader;

    const CONFIG: &str = r#"
agents:
  facilitator:
    persona: facilitator.md
    document: cards.md
  multi_agent:
    persona: router.md
    condition: "Pick one: {input}"
    agents:
      - condition: facilitator
        agent: facilitator
"#;

    fn loader() -> StaticPromptLoader {
        StaticPromptLoader::new()
            .with("facilitator.md", "You facilitate.")
            .with("cards.md", "CARDS")
            .with("router.md", "You route.")
            .with("guardrails.md", "\nNo secrets.")
    }

    fn catalog(text: &str) -> Arc<AgentCatalog> {
        Arc::new(ConfigLoader::load_str(text).unwrap())
    }

    #[test]
    fn test_build_registers_every_agent() {
        let registry = AgentRegistry::build(catalog(CONFIG), &loader(), None).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["facilitator", "multi_agent"]);

        let facilitator = registry.persona("facilitator").unwrap();
        assert!(facilitator.system_prompt().contains("<documents>CARDS</documents>"));
        assert!(facilitator.system_prompt().contains(DEFAULT_GUARDRAILS));

        let router = registry.get_required("multi_agent").unwrap();
        assert!(router.is_routing());
        assert!(registry.persona("multi_agent").is_err());
        assert!(matches!(registry.get_required("nobody"), Err(ChatError::AgentNotFound(_))));
    }

    #[test]
    fn test_guardrails_override() {
        let registry = AgentRegistry::build(catalog(CONFIG), &loader(), Some("guardrails.md")).unwrap();
        let prompt = registry.persona("facilitator").unwrap().system_prompt();
        assert!(prompt.starts_with("You facilitate.\nNo secrets."));
        assert!(!prompt.contains(DEFAULT_GUARDRAILS));
    }

    #[test]
    fn test_missing_prompt_fails_build() {
        let loader = StaticPromptLoader::new().with("facilitator.md", "You facilitate.");
        let err = AgentRegistry::build(catalog(CONFIG), &loader, None).unwrap_err();
        assert!(matches!(err, ChatError::PromptLoad { ref reference, .. } if reference == "cards.md"));
    }
}
