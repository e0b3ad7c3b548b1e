//! Configuration validation.
//!
//! Collects every problem in a raw document so `discovery validate` can
//! report them all at once; the loader fails on the first one.

use std::collections::{HashMap, HashSet};

use crate::catalog::{normalize_label, INPUT_PLACEHOLDER};
use crate::models::{RawAgent, RawConfig, RawPage};

/// A single validation problem tied to a field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Dotted path such as `agents.facilitator.persona`
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result with details.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(Issue {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(Issue {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn merge(&mut self, other: ValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// First error, if any.
    pub fn first_error(&self) -> Option<&Issue> {
        self.errors.first()
    }
}

/// Validator for raw agents/sections documents.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a whole document.
    pub fn validate(config: &RawConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if config.agents.is_empty() {
            result.add_error("agents", "at least one agent must be declared");
        }

        for (id, agent) in &config.agents {
            result.merge(Self::validate_agent(id, agent, config));
        }

        let mut seen_paths: HashMap<&str, String> = HashMap::new();
        for (section, pages) in &config.sections {
            for (index, page) in pages.iter().enumerate() {
                let prefix = format!("sections.{}[{}]", section, index);
                result.merge(Self::validate_page(&prefix, page, config));

                if let Some(url_path) = page.url_path.as_deref().filter(|p| !p.trim().is_empty()) {
                    if let Some(previous) = seen_paths.insert(url_path, prefix.clone()) {
                        result.add_error(
                            format!("{}.url_path", prefix),
                            format!("url_path `{}` is already used by {}", url_path, previous),
                        );
                    }
                }
            }
        }

        if result.valid {
            result.merge(Self::validate_routing_graph(config));
            Self::warn_unreferenced(config, &mut result);
        }

        result
    }

    /// Validate one agent entry.
    pub fn validate_agent(id: &str, agent: &RawAgent, config: &RawConfig) -> ValidationResult {
        let mut result = ValidationResult::new();
        let prefix = format!("agents.{}", id);

        if id.trim().is_empty() {
            result.add_error("agents", "agent identifiers must not be empty");
        }

        if is_blank(agent.persona.as_deref()) {
            result.add_error(format!("{}.persona", prefix), "persona reference is required");
        }

        if let Some(model) = agent.model.as_deref() {
            if model.trim().is_empty() {
                result.add_error(format!("{}.model", prefix), "model must not be empty when declared");
            }
        }

        if let Some(temperature) = agent.temperature {
            if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
                result.add_error(
                    format!("{}.temperature", prefix),
                    format!("temperature must be between 0 and 2, got {}", temperature),
                );
            }
        }

        if agent.is_routing() {
            Self::validate_routing_agent(id, &prefix, agent, config, &mut result);
        } else {
            Self::validate_leaf_agent(&prefix, agent, &mut result);
        }

        result
    }

    fn validate_routing_agent(
        id: &str,
        prefix: &str,
        agent: &RawAgent,
        config: &RawConfig,
        result: &mut ValidationResult,
    ) {
        let condition = agent.condition.as_deref().unwrap_or_default();
        if condition.trim().is_empty() {
            result.add_error(
                format!("{}.condition", prefix),
                "classification instruction must not be empty",
            );
        } else if !condition.contains(INPUT_PLACEHOLDER) {
            result.add_error(
                format!("{}.condition", prefix),
                format!("classification instruction must contain the {} placeholder", INPUT_PLACEHOLDER),
            );
        }

        if agent.document.is_some() || agent.documents.is_some() {
            result.add_warning(
                format!("{}.documents", prefix),
                "routing agents do not use grounding documents; they will be ignored",
            );
        }

        let routes = match agent.agents.as_deref() {
            Some(routes) if !routes.is_empty() => routes,
            _ => {
                result.add_error(
                    format!("{}.agents", prefix),
                    "routing agents must declare at least one {condition, agent} pair",
                );
                return;
            }
        };

        let mut labels: HashMap<String, usize> = HashMap::new();
        for (index, route) in routes.iter().enumerate() {
            let row = format!("{}.agents[{}]", prefix, index);

            match route.condition.as_deref() {
                Some(label) if !label.trim().is_empty() => {
                    if let Some(first) = labels.insert(normalize_label(label), index) {
                        result.add_error(
                            format!("{}.condition", row),
                            format!("label `{}` duplicates {}.agents[{}]", label.trim(), prefix, first),
                        );
                    }
                }
                _ => result.add_error(format!("{}.condition", row), "route label is required"),
            }

            match route.agent.as_deref() {
                Some(target) if !target.trim().is_empty() => {
                    if target == id {
                        result.add_error(
                            format!("{}.agent", row),
                            "routing agent must not route to itself",
                        );
                    } else if !config.agents.contains_key(target) {
                        result.add_error(
                            format!("{}.agent", row),
                            format!("target agent `{}` is not declared", target),
                        );
                    }
                }
                _ => result.add_error(format!("{}.agent", row), "route target is required"),
            }
        }
    }

    fn validate_leaf_agent(prefix: &str, agent: &RawAgent, result: &mut ValidationResult) {
        if agent.agents.is_some() {
            result.add_error(
                format!("{}.condition", prefix),
                "a routing table was declared without a classification instruction",
            );
        }

        match (&agent.document, &agent.documents) {
            (Some(_), Some(_)) => result.add_error(
                format!("{}.documents", prefix),
                "declare either `document` or `documents`, not both",
            ),
            (None, None) => result.add_error(
                format!("{}.document", prefix),
                "a grounding `document` or `documents` list is required",
            ),
            (Some(document), None) => {
                if document.trim().is_empty() {
                    result.add_error(format!("{}.document", prefix), "document reference must not be empty");
                }
            }
            (None, Some(documents)) => {
                if documents.is_empty() {
                    result.add_error(format!("{}.documents", prefix), "documents list must not be empty");
                }
                for (index, document) in documents.iter().enumerate() {
                    if document.trim().is_empty() {
                        result.add_error(
                            format!("{}.documents[{}]", prefix, index),
                            "document reference must not be empty",
                        );
                    }
                }
            }
        }
    }

    /// Validate one page entry.
    pub fn validate_page(prefix: &str, page: &RawPage, config: &RawConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        match page.agent.as_deref() {
            Some(agent) if !agent.trim().is_empty() => {
                if !config.agents.contains_key(agent) {
                    result.add_error(
                        format!("{}.agent", prefix),
                        format!("page references undeclared agent `{}`", agent),
                    );
                }
            }
            _ => result.add_error(format!("{}.agent", prefix), "agent is required"),
        }

        let required = [
            ("type", &page.page_type),
            ("title", &page.title),
            ("icon", &page.icon),
            ("url_path", &page.url_path),
            ("header", &page.header),
            ("subtitle", &page.subtitle),
        ];
        for (name, value) in required {
            if value.is_none() {
                result.add_error(format!("{}.{}", prefix, name), format!("{} is required", name));
            }
        }

        result
    }

    /// Reject routing agents from which no leaf agent can be reached.
    ///
    /// Such an agent would bounce between routers until the hop bound trips on
    /// every request. Cycles that still have an exit are left to the
    /// dispatcher's hop counter.
    pub fn validate_routing_graph(config: &RawConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        let mut reaches_leaf: HashSet<&str> = config
            .agents
            .iter()
            .filter(|(_, agent)| !agent.is_routing())
            .map(|(id, _)| id.as_str())
            .collect();

        loop {
            let mut changed = false;
            for (id, agent) in config.agents.iter().filter(|(_, a)| a.is_routing()) {
                if reaches_leaf.contains(id.as_str()) {
                    continue;
                }
                let has_exit = agent
                    .agents
                    .iter()
                    .flatten()
                    .filter_map(|route| route.agent.as_deref())
                    .any(|target| reaches_leaf.contains(target));
                if has_exit {
                    reaches_leaf.insert(id.as_str());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        for (id, agent) in &config.agents {
            if agent.is_routing() && !reaches_leaf.contains(id.as_str()) {
                result.add_error(
                    format!("agents.{}.agents", id),
                    "no leaf agent is reachable from this routing agent",
                );
            }
        }

        result
    }

    fn warn_unreferenced(config: &RawConfig, result: &mut ValidationResult) {
        let mut referenced: HashSet<&str> = config
            .sections
            .values()
            .flatten()
            .filter_map(|page| page.agent.as_deref())
            .collect();
        for agent in config.agents.values() {
            referenced.extend(agent.agents.iter().flatten().filter_map(|r| r.agent.as_deref()));
        }

        for id in config.agents.keys() {
            if !referenced.contains(id.as_str()) {
                result.add_warning(
                    format!("agents.{}", id),
                    "agent is not referenced by any page or routing table",
                );
            }
        }
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}
