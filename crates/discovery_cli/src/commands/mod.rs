//! CLI command definitions.
//!
//! This module defines the command structure for the Discovery Agents CLI
//! and the loading steps the subcommands share.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use discovery_chat::{AgentRegistry, ChatService, FsPromptLoader};
use discovery_config::{AgentCatalog, ConfigLoader, RuntimeSettings};

pub mod agents;
pub mod chat;
pub mod route;
pub mod validate;

/// Discovery Agents - persona chat with conditional routing
#[derive(Parser)]
#[command(name = "discovery")]
#[command(version, about = "Discovery Agents - persona chat with conditional routing")]
#[command(long_about = r#"
Discovery Agents lets you talk to LLM-backed personas declared in a YAML
file: workshop facilitators, simulated company representatives, document
experts, and routing agents that hand each question to the right persona.

COMMANDS:
  validate  → Check the agents file (and optionally every prompt file)
  agents    → List agents and the pages that expose them
  route     → Show which agent would answer a message, without answering
  chat      → Chat with an agent (interactive or one-shot)

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or unknown agent
  3 - Configuration or validation failure
  4 - Routing failure
  5 - Completion service failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Agents configuration file
    #[arg(short, long, global = true, env = "DISCOVERY_CONFIG", default_value = "config/agents.yaml")]
    pub config: PathBuf,

    /// Runtime settings file (defaults to .discovery/settings.json when present)
    #[arg(long, global = true, env = "DISCOVERY_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Root for persona and document references (defaults to the config file's directory)
    #[arg(long, global = true, env = "DISCOVERY_PROMPTS")]
    pub prompts: Option<PathBuf>,
}

impl GlobalArgs {
    /// Directory prompt references are resolved against.
    pub fn prompt_root(&self) -> PathBuf {
        match &self.prompts {
            Some(root) => root.clone(),
            None => self
                .config
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    /// Load and validate the agents file.
    pub fn load_catalog(&self) -> Result<Arc<AgentCatalog>> {
        let catalog = ConfigLoader::load_file(&self.config)
            .with_context(|| format!("Failed to load agents from {}", self.config.display()))?;
        Ok(Arc::new(catalog))
    }

    /// Load runtime settings from file and environment.
    pub fn load_settings(&self) -> Result<RuntimeSettings> {
        RuntimeSettings::load(self.settings.as_deref()).context("Failed to load runtime settings")
    }

    /// Load every agent's prompts.
    pub fn load_registry(&self, settings: &RuntimeSettings) -> Result<Arc<AgentRegistry>> {
        let catalog = self.load_catalog()?;
        let root = self.prompt_root();
        debug!("Resolving prompts against {:?}", root);

        let registry = AgentRegistry::build(catalog, &FsPromptLoader::new(root), settings.guardrails.as_deref())
            .context("Failed to load agent prompts")?;
        Ok(Arc::new(registry))
    }

    /// Build the chat service for the given settings.
    pub fn build_service(&self, settings: &RuntimeSettings) -> Result<Arc<ChatService>> {
        let registry = self.load_registry(settings)?;
        let service = ChatService::from_settings(registry, settings)?;
        Ok(Arc::new(service))
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the agents configuration
    Validate(validate::ValidateArgs),

    /// List configured agents and pages
    Agents(agents::AgentsArgs),

    /// Resolve which agent would answer a message
    Route(route::RouteArgs),

    /// Chat with an agent
    Chat(chat::ChatArgs),
}
