//! Validated, immutable agent definitions and navigation pages.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Model used when an agent does not declare one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Temperature used when an agent does not declare one.
pub const DEFAULT_TEMPERATURE: f64 = 1.0;

/// Placeholder in a classification template replaced by the transcript.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Kind of configured agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    /// Persona grounded in a single document
    Simple,
    /// Persona grounded in several documents
    MultiDocument,
    /// Classifies the conversation and delegates to another agent
    Routing,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::MultiDocument => "multi-document",
            Self::Routing => "routing",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `label -> target` row of a routing table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Route {
    /// Label as declared
    pub label: String,
    /// Target agent identifier
    pub target: String,
}

impl Route {
    /// The label in the form classifier output is compared against.
    pub fn normalized_label(&self) -> String {
        normalize_label(&self.label)
    }
}

/// Trim and case-fold a label or classifier answer.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Routing-specific part of an agent definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingSpec {
    /// Classification instruction containing [`INPUT_PLACEHOLDER`]
    pub condition: String,
    /// Ordered routing table, never empty
    pub routes: Vec<Route>,
}

impl RoutingSpec {
    /// Declared labels in table order.
    pub fn labels(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.label.as_str()).collect()
    }

    /// Targets in table order.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.target.as_str())
    }
}

/// A validated agent definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentDefinition {
    pub id: String,
    pub kind: AgentKind,
    /// Persona prompt reference
    pub persona: String,
    /// Grounding document references in declaration order
    pub documents: Vec<String>,
    pub model: String,
    pub temperature: f64,
    /// Present exactly when `kind` is [`AgentKind::Routing`]
    pub routing: Option<RoutingSpec>,
}

impl AgentDefinition {
    pub fn is_routing(&self) -> bool {
        self.kind == AgentKind::Routing
    }

    pub fn is_leaf(&self) -> bool {
        !self.is_routing()
    }
}

/// A navigation page bound to one agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    #[serde(rename = "type")]
    pub page_type: String,
    pub agent: String,
    pub title: String,
    pub icon: String,
    pub url_path: String,
    pub header: String,
    pub subtitle: String,
    pub admin_only: bool,
}

impl Page {
    /// Whether a caller with the given role may see this page.
    pub fn is_visible_to(&self, is_admin: bool) -> bool {
        is_admin || !self.admin_only
    }
}

/// A named, ordered group of pages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub pages: Vec<Page>,
}

/// The validated configuration: every agent and section, immutable after load.
///
/// Built by [`crate::ConfigLoader`]; construct a separate catalog per test
/// instead of sharing one.
#[derive(Debug, Clone, Default)]
pub struct AgentCatalog {
    agents: IndexMap<String, AgentDefinition>,
    sections: Vec<Section>,
    guardrails: Option<String>,
}

impl AgentCatalog {
    pub(crate) fn new(
        agents: IndexMap<String, AgentDefinition>,
        sections: Vec<Section>,
        guardrails: Option<String>,
    ) -> Self {
        Self {
            agents,
            sections,
            guardrails,
        }
    }

    /// Get an agent definition by identifier.
    pub fn get(&self, id: &str) -> Option<&AgentDefinition> {
        self.agents.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.agents.contains_key(id)
    }

    /// All definitions in declaration order.
    pub fn agents(&self) -> impl Iterator<Item = &AgentDefinition> {
        self.agents.values()
    }

    /// All identifiers in declaration order.
    pub fn ids(&self) -> Vec<&str> {
        self.agents.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Guardrails document reference declared in the file, if any.
    pub fn guardrails(&self) -> Option<&str> {
        self.guardrails.as_deref()
    }

    /// Every page in section order.
    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.sections.iter().flat_map(|s| s.pages.iter())
    }

    /// Pages the caller may see, in section order.
    pub fn visible_pages(&self, is_admin: bool) -> Vec<&Page> {
        self.pages().filter(|p| p.is_visible_to(is_admin)).collect()
    }

    /// Find the first visible page for an agent.
    pub fn page_for(&self, agent: &str, is_admin: bool) -> Option<&Page> {
        self.pages()
            .find(|p| p.agent == agent && p.is_visible_to(is_admin))
    }

    /// Whether an agent is reachable from a page the caller may see.
    pub fn is_available(&self, agent: &str, is_admin: bool) -> bool {
        self.page_for(agent, is_admin).is_some()
    }

    /// Agent behind the first visible page.
    pub fn default_agent(&self, is_admin: bool) -> Option<&str> {
        self.pages()
            .find(|p| p.is_visible_to(is_admin))
            .map(|p| p.agent.as_str())
    }
}
