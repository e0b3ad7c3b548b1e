//! # discovery_chat - Persona agents and conditional routing
//!
//! This crate turns a validated agent catalog into something that answers
//! chat messages:
//! - Persona agents grounded in one or more documents
//! - Routing agents that classify the conversation and delegate
//! - Pluggable completion providers (OpenAI, Anthropic, offline fallback)
//! - Chat sessions with slash commands
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   ChatSession   │────▶│   ChatService   │────▶│RoutingDispatcher│
//! └─────────────────┘     └────────┬────────┘     └────────┬────────┘
//!                                  │                       │ classify
//!                                  ▼                       ▼
//!                        ┌─────────────────┐     ┌─────────────────┐
//!                        │  PersonaAgent   │────▶│CompletionProvider│
//!                        └─────────────────┘     └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use discovery_chat::{AgentRegistry, ChatService, ChatSession, FsPromptLoader};
//! use discovery_config::{ConfigLoader, RuntimeSettings};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Arc::new(ConfigLoader::load_file("config/agents.yaml")?);
//! let registry = AgentRegistry::build(catalog, &FsPromptLoader::new("config"), None)?;
//! let service = ChatService::from_settings(Arc::new(registry), &RuntimeSettings::load(None)?)?;
//!
//! let mut session = ChatSession::new(Arc::new(service), false)?;
//! let reply = session.send("Hello!").await?;
//! println!("{}", reply.collect_text().await?);
//! # Ok(())
//! # }
//! ```

pub mod completion;
pub mod error;
pub mod llm;
pub mod mock;
pub mod persona;
pub mod prompt;
pub mod registry;
pub mod router;
pub mod service;
pub mod session;
pub mod sse;
pub mod stream;
pub mod types;

pub use completion::*;
pub use error::*;
pub use llm::{LlmAdapter, LlmProvider};
pub use persona::*;
pub use prompt::*;
pub use registry::*;
pub use router::*;
pub use service::*;
pub use session::*;
pub use stream::*;
pub use types::*;
