//! Integration tests for configuration loading.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

use discovery_config::{
    AgentKind, ConfigError, ConfigLoader, ConfigValidator, ProviderKind, RuntimeSettings,
};

fn shipped_config_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config")
}

/// The agents file shipped with the repository must load cleanly.
#[test]
fn test_shipped_config_loads() {
    let dir = shipped_config_dir();
    let catalog = ConfigLoader::load_file(dir.join("agents.yaml")).unwrap();

    assert_eq!(
        catalog.ids(),
        vec!["facilitator", "design_thinking_expert", "customer", "prompt_lab", "multi_agent"]
    );

    let router = catalog.get("multi_agent").unwrap();
    assert_eq!(router.kind, AgentKind::Routing);
    let routing = router.routing.as_ref().unwrap();
    assert!(routing.condition.contains("{input}"));
    assert_eq!(routing.labels(), vec!["facilitator", "design_thinking_expert"]);

    let expert = catalog.get("design_thinking_expert").unwrap();
    assert_eq!(expert.documents.len(), 2);

    // Admin-only pages stay hidden from the public default
    assert_eq!(catalog.default_agent(false), Some("multi_agent"));
    assert!(!catalog.is_available("prompt_lab", false));
    assert!(catalog.is_available("prompt_lab", true));
}

/// Every prompt the shipped config references must exist on disk.
#[test]
fn test_shipped_prompts_exist() {
    let dir = shipped_config_dir();
    let catalog = ConfigLoader::load_file(dir.join("agents.yaml")).unwrap();

    let mut references: Vec<&str> = catalog.guardrails().into_iter().collect();
    for agent in catalog.agents() {
        references.push(&agent.persona);
        references.extend(agent.documents.iter().map(|d| d.as_str()));
    }

    for reference in references {
        let path = dir.join(reference);
        assert!(path.is_file(), "Missing prompt file: {}", path.display());
        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.trim().is_empty(), "Prompt file {} is empty", reference);
    }
}

#[test]
fn test_dangling_route_target_is_rejected() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("agents.yaml");
    fs::write(
        &path,
        r#"
agents:
  facilitator:
    persona: facilitator.md
    document: cards.md
  multi_agent:
    persona: router.md
    condition: "Who answers? {input}"
    agents:
      - condition: facilitator
        agent: facilitator
      - condition: ghost
        agent: ghost_agent
"#,
    )
    .unwrap();

    let err = ConfigLoader::load_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }));
    assert_eq!(err.field(), Some("agents.multi_agent.agents[1].agent"));
}

#[test]
fn test_router_cycle_without_exit_is_rejected() {
    let raw = ConfigLoader::parse(
        r#"
agents:
  ping:
    persona: p.md
    condition: "{input}"
    agents:
      - { condition: pong, agent: pong }
  pong:
    persona: p.md
    condition: "{input}"
    agents:
      - { condition: ping, agent: ping }
"#,
    )
    .unwrap();

    let result = ConfigValidator::validate(&raw);
    assert!(!result.valid);
    assert!(result
        .errors
        .iter()
        .all(|e| e.message.contains("no leaf agent is reachable")));
    assert_eq!(result.errors.len(), 2);
}

#[test]
fn test_missing_file_reports_path() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("absent.yaml");

    let err = ConfigLoader::load_file(&path).unwrap_err();
    match err {
        ConfigError::NotFound(reported) => assert_eq!(reported, path),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_settings_file_and_env_overrides() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("settings.json");
    fs::write(&path, r#"{ "provider": "null", "maxRouteHops": 3 }"#).unwrap();

    let settings = RuntimeSettings::from_file(&path).unwrap();
    assert_eq!(settings.provider, ProviderKind::Null);
    assert_eq!(settings.max_route_hops, 3);

    let overridden = settings
        .apply_vars(|key| match key {
            "DISCOVERY_MAX_HOPS" => Some("7".to_string()),
            _ => None,
        })
        .unwrap();
    assert_eq!(overridden.max_route_hops, 7);
    assert_eq!(overridden.provider, ProviderKind::Null);
}
