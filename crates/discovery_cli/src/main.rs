//! Discovery Agents CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or unknown agent
//! - 3: Configuration or validation failure
//! - 4: Routing failure
//! - 5: Completion service failure

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use discovery_chat::ChatError;
use discovery_config::ConfigError;

mod commands;

use commands::{Cli, Commands, GlobalArgs};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const CONFIG_FAILURE: u8 = 3;
    pub const ROUTING_FAILURE: u8 = 4;
    pub const COMPLETION_FAILURE: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.global);

    let result = match cli.command {
        Commands::Validate(args) => commands::validate::execute(&cli.global, args).await,
        Commands::Agents(args) => commands::agents::execute(&cli.global, args).await,
        Commands::Route(args) => commands::route::execute(&cli.global, args).await,
        Commands::Chat(args) => commands::chat::execute(&cli.global, args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(categorize_error(&e))
        }
    }
}

fn init_logging(global: &GlobalArgs) {
    let default_directives = if global.verbose {
        "discovery=debug,info"
    } else if global.quiet {
        "warn"
    } else {
        "discovery=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(filter);
    let log_result = if global.log_json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<ChatError>() {
            return match err {
                ChatError::Config(_) | ChatError::PromptLoad { .. } => ExitCodes::CONFIG_FAILURE,
                ChatError::AgentNotFound(_) | ChatError::AgentUnavailable(_) => ExitCodes::INVALID_ARGS,
                ChatError::RoutingAmbiguous { .. } | ChatError::RoutingDepthExceeded { .. } => {
                    ExitCodes::ROUTING_FAILURE
                }
                e if e.is_completion_failure() => ExitCodes::COMPLETION_FAILURE,
                _ => ExitCodes::GENERAL_ERROR,
            };
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return ExitCodes::CONFIG_FAILURE;
        }
    }
    ExitCodes::GENERAL_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(result: Result<(), impl Into<anyhow::Error>>) -> u8 {
        let err: anyhow::Error = match result {
            Ok(()) => panic!("expected an error"),
            Err(e) => e.into(),
        };
        categorize_error(&err.context("while running"))
    }

    #[test]
    fn test_exit_codes_follow_error_class() {
        assert_eq!(
            code(Err(ConfigError::invalid("agents.x.persona", "persona reference is required"))),
            ExitCodes::CONFIG_FAILURE
        );
        assert_eq!(
            code(Err(ChatError::AgentNotFound("ghost".to_string()))),
            ExitCodes::INVALID_ARGS
        );
        assert_eq!(
            code(Err(ChatError::RoutingAmbiguous {
                agent: "multi_agent".to_string(),
                output: "unknown_label".to_string(),
                labels: vec!["facilitator".to_string()],
            })),
            ExitCodes::ROUTING_FAILURE
        );
        assert_eq!(
            code(Err(ChatError::classification(
                "multi_agent",
                ChatError::LlmStatus { status: 500, body: String::new() }
            ))),
            ExitCodes::COMPLETION_FAILURE
        );
        assert_eq!(
            code(Err(ChatError::Config(ConfigError::NotFound("agents.yaml".into())))),
            ExitCodes::CONFIG_FAILURE
        );
        assert_eq!(code(Err(anyhow::anyhow!("boom"))), ExitCodes::GENERAL_ERROR);
    }
}
