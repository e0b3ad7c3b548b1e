//! Loading the agents/sections document into an [`AgentCatalog`].

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::catalog::{
    AgentCatalog, AgentDefinition, AgentKind, Page, Route, RoutingSpec, Section, DEFAULT_MODEL,
    DEFAULT_TEMPERATURE,
};
use crate::error::{ConfigError, ConfigResult};
use crate::models::{RawAgent, RawConfig, RawPage};
use crate::validator::ConfigValidator;

/// Loader for agent configuration files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Parse raw text without validating it.
    pub fn parse(text: &str) -> ConfigResult<RawConfig> {
        let raw: RawConfig = serde_yaml::from_str(text)?;
        Ok(raw)
    }

    /// Read a file without validating it.
    pub fn read(path: impl AsRef<Path>) -> ConfigResult<RawConfig> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        debug!("Reading agent configuration from {:?}", path);
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate raw text.
    pub fn load_str(text: &str) -> ConfigResult<AgentCatalog> {
        Self::build(Self::parse(text)?)
    }

    /// Read and validate a file.
    pub fn load_file(path: impl AsRef<Path>) -> ConfigResult<AgentCatalog> {
        let path = path.as_ref();
        let catalog = Self::build(Self::read(path)?)?;
        info!(
            "Loaded {} agents and {} sections from {:?}",
            catalog.len(),
            catalog.sections().len(),
            path
        );
        Ok(catalog)
    }

    /// Validate a raw document and convert it into a catalog.
    ///
    /// Fails on the first validation error; warnings are logged.
    pub fn build(raw: RawConfig) -> ConfigResult<AgentCatalog> {
        let result = ConfigValidator::validate(&raw);
        for warning in &result.warnings {
            warn!("{}", warning);
        }
        if let Some(issue) = result.first_error() {
            let extra = result.errors.len() - 1;
            let message = if extra > 0 {
                format!("{} ({} more problem(s) found)", issue.message, extra)
            } else {
                issue.message.clone()
            };
            return Err(ConfigError::invalid(issue.field.clone(), message));
        }

        let mut agents = IndexMap::with_capacity(raw.agents.len());
        for (id, agent) in raw.agents {
            let definition = Self::definition(&id, agent)?;
            agents.insert(id, definition);
        }

        let mut sections = Vec::with_capacity(raw.sections.len());
        for (name, pages) in raw.sections {
            let pages = pages
                .into_iter()
                .enumerate()
                .map(|(index, page)| Self::page(&name, index, page))
                .collect::<ConfigResult<Vec<_>>>()?;
            sections.push(Section { name, pages });
        }

        Ok(AgentCatalog::new(agents, sections, raw.guardrails))
    }

    fn definition(id: &str, agent: RawAgent) -> ConfigResult<AgentDefinition> {
        let prefix = format!("agents.{}", id);
        let persona = agent
            .persona
            .ok_or_else(|| ConfigError::invalid(format!("{}.persona", prefix), "persona reference is required"))?;
        let model = agent.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let temperature = agent.temperature.unwrap_or(DEFAULT_TEMPERATURE);

        if let Some(condition) = agent.condition {
            let routes = agent
                .agents
                .unwrap_or_default()
                .into_iter()
                .enumerate()
                .map(|(index, route)| {
                    let row = format!("{}.agents[{}]", prefix, index);
                    Ok(Route {
                        label: route
                            .condition
                            .map(|l| l.trim().to_string())
                            .ok_or_else(|| ConfigError::invalid(format!("{}.condition", row), "route label is required"))?,
                        target: route
                            .agent
                            .ok_or_else(|| ConfigError::invalid(format!("{}.agent", row), "route target is required"))?,
                    })
                })
                .collect::<ConfigResult<Vec<_>>>()?;

            return Ok(AgentDefinition {
                id: id.to_string(),
                kind: AgentKind::Routing,
                persona,
                documents: Vec::new(),
                model,
                temperature,
                routing: Some(RoutingSpec { condition, routes }),
            });
        }

        let (kind, documents) = match (agent.document, agent.documents) {
            (Some(document), None) => (AgentKind::Simple, vec![document]),
            (None, Some(documents)) => (AgentKind::MultiDocument, documents),
            _ => {
                return Err(ConfigError::invalid(
                    format!("{}.document", prefix),
                    "a grounding `document` or `documents` list is required",
                ))
            }
        };

        Ok(AgentDefinition {
            id: id.to_string(),
            kind,
            persona,
            documents,
            model,
            temperature,
            routing: None,
        })
    }

    fn page(section: &str, index: usize, page: RawPage) -> ConfigResult<Page> {
        let prefix = format!("sections.{}[{}]", section, index);
        let required = |value: Option<String>, name: &str| {
            value.ok_or_else(|| ConfigError::invalid(format!("{}.{}", prefix, name), format!("{} is required", name)))
        };

        Ok(Page {
            page_type: required(page.page_type, "type")?,
            agent: required(page.agent, "agent")?,
            title: required(page.title, "title")?,
            icon: required(page.icon, "icon")?,
            url_path: required(page.url_path, "url_path")?,
            header: required(page.header, "header")?,
            subtitle: required(page.subtitle, "subtitle")?,
            admin_only: page.admin_only,
        })
    }
}

impl std::str::FromStr for AgentCatalog {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigLoader::load_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
agents:
  facilitator:
    persona: prompts/facilitator_persona.md
    document: prompts/discovery_cards.md
    model: gpt-4o-mini
    temperature: 0.7
  design_thinking_expert:
    persona: prompts/design_thinking_persona.md
    documents:
      - prompts/design_thinking.md
      - prompts/discovery_cards.md
  multi_agent:
    persona: prompts/router_persona.md
    condition: |
      Answer with one word: facilitator or design_thinking_expert.
      Conversation:
      {input}
    temperature: 0
    agents:
      - condition: Facilitator
        agent: facilitator
      - condition: design_thinking_expert
        agent: design_thinking_expert
sections:
  Workshop:
    - type: agent
      agent: multi_agent
      title: Multi Agent
      icon: ":busts_in_silhouette:"
      url_path: multi
      header: Multi Agent
      subtitle: Routes to the right expert
    - type: agent
      agent: facilitator
      title: Facilitator
      icon: ":speech_balloon:"
      url_path: facilitator
      header: Workshop Facilitator
      subtitle: Guides the workshop
      admin_only: true
"#;

    #[test]
    fn test_load_catalog() {
        let catalog = ConfigLoader::load_str(CONFIG).unwrap();
        assert_eq!(catalog.ids(), vec!["facilitator", "design_thinking_expert", "multi_agent"]);

        let facilitator = catalog.get("facilitator").unwrap();
        assert_eq!(facilitator.kind, AgentKind::Simple);
        assert_eq!(facilitator.model, "gpt-4o-mini");
        assert_eq!(facilitator.temperature, 0.7);
        assert_eq!(facilitator.documents, vec!["prompts/discovery_cards.md"]);

        let expert = catalog.get("design_thinking_expert").unwrap();
        assert_eq!(expert.kind, AgentKind::MultiDocument);
        assert_eq!(expert.model, DEFAULT_MODEL);
        assert_eq!(expert.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(expert.documents.len(), 2);

        let router = catalog.get("multi_agent").unwrap();
        assert!(router.is_routing());
        let routing = router.routing.as_ref().unwrap();
        assert_eq!(routing.labels(), vec!["Facilitator", "design_thinking_expert"]);
        assert_eq!(routing.routes[0].normalized_label(), "facilitator");
        assert!(router.documents.is_empty());
    }

    #[test]
    fn test_load_sections() {
        let catalog: AgentCatalog = CONFIG.parse().unwrap();
        assert_eq!(catalog.sections().len(), 1);
        let pages = &catalog.sections()[0].pages;
        assert_eq!(pages[0].url_path, "multi");
        assert!(pages[1].admin_only);
        assert_eq!(catalog.default_agent(false), Some("multi_agent"));
    }

    #[test]
    fn test_first_error_names_field() {
        let err = ConfigLoader::load_str(
            r#"
agents:
  router:
    persona: r.md
    condition: "{input}"
    agents:
      - condition: missing
        agent: nowhere
"#,
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("agents.router.agents[0].agent"));
    }

    #[test]
    fn test_error_counts_remaining_problems() {
        let err = ConfigLoader::load_str(
            r#"
agents:
  a:
    document: a.md
  b:
    document: b.md
"#,
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("agents.a.persona"));
        assert!(err.to_string().contains("1 more problem"));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = ConfigLoader::load_str("agents: [not, a, mapping").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::load_file("/definitely/not/here/agents.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
