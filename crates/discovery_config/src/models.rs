//! Raw configuration models as they appear in the agents file.
//!
//! These types mirror the YAML document one-to-one and accept missing
//! fields, so the validator can report exactly which field is wrong instead
//! of failing inside the deserializer.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The whole agents/sections document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    /// Agent definitions keyed by identifier, in declaration order
    #[serde(default)]
    pub agents: IndexMap<String, RawAgent>,
    /// Navigation sections keyed by section name, in declaration order
    #[serde(default)]
    pub sections: IndexMap<String, Vec<RawPage>>,
    /// Optional guardrails document appended to every persona
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardrails: Option<String>,
}

/// A single agent entry.
///
/// Routing agents declare `condition` and a nested `agents` table; leaf
/// agents declare either `document` or `documents`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAgent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Classification instruction template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Ordered routing table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents: Option<Vec<RawRoute>>,
}

impl RawAgent {
    /// Whether the entry is shaped like a routing agent.
    pub fn is_routing(&self) -> bool {
        self.condition.is_some()
    }
}

/// One `{condition, agent}` row of a routing table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRoute {
    /// Label the classifier must answer with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Target agent identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// A page entry inside a section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPage {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub page_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub admin_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preserves_declaration_order() {
        let yaml = r#"
agents:
  zeta:
    persona: prompts/zeta.md
    document: docs/zeta.md
  alpha:
    persona: prompts/alpha.md
    documents: [docs/a.md, docs/b.md]
sections:
  Workshop:
    - type: agent
      agent: zeta
      title: Zeta
      icon: ":z:"
      url_path: zeta
      header: Zeta
      subtitle: Last letter
"#;
        let raw: RawConfig = serde_yaml::from_str(yaml).unwrap();
        let keys: Vec<_> = raw.agents.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(
            raw.agents["alpha"].documents.as_deref(),
            Some(&["docs/a.md".to_string(), "docs/b.md".to_string()][..])
        );

        let page = &raw.sections["Workshop"][0];
        assert_eq!(page.page_type.as_deref(), Some("agent"));
        assert!(!page.admin_only);
    }

    #[test]
    fn test_routing_shape() {
        let yaml = r#"
persona: prompts/router.md
condition: "Pick one: {input}"
agents:
  - condition: facilitator
    agent: facilitator
"#;
        let raw: RawAgent = serde_yaml::from_str(yaml).unwrap();
        assert!(raw.is_routing());
        let routes = raw.agents.unwrap();
        assert_eq!(routes[0].condition.as_deref(), Some("facilitator"));
    }
}
