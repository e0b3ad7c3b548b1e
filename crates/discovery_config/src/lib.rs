//! # discovery_config
//!
//! Configuration loading for Discovery Agents.
//!
//! The agents file declares every persona, its grounding documents and model
//! parameters, the routing tables of multi-agents, and the navigation
//! sections that expose agents as pages. Loading is fail-fast: a document
//! either becomes an immutable [`AgentCatalog`] or a [`ConfigError`] naming
//! the offending field.
//!
//! ## Example
//!
//! ```rust,no_run
//! use discovery_config::{ConfigLoader, RuntimeSettings};
//!
//! let catalog = ConfigLoader::load_file("config/agents.yaml").unwrap();
//! let settings = RuntimeSettings::load(None).unwrap();
//!
//! for page in catalog.visible_pages(false) {
//!     println!("{} {} -> {}", page.icon, page.title, page.agent);
//! }
//! println!("routing bound: {} hops", settings.max_route_hops);
//! ```

pub mod catalog;
pub mod error;
pub mod loader;
pub mod models;
pub mod settings;
pub mod validator;

pub use catalog::{
    normalize_label, AgentCatalog, AgentDefinition, AgentKind, Page, Route, RoutingSpec, Section,
    DEFAULT_MODEL, DEFAULT_TEMPERATURE, INPUT_PLACEHOLDER,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use models::{RawAgent, RawConfig, RawPage, RawRoute};
pub use settings::{ProviderKind, RuntimeSettings, SETTINGS_FILE};
pub use validator::{ConfigValidator, Issue, ValidationResult};
