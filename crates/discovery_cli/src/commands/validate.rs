//! Validate command - Check the agents configuration.

use anyhow::Result;
use clap::Args;
use tracing::info;

use discovery_config::{ConfigError, ConfigLoader, ConfigValidator};

use super::GlobalArgs;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Also load every persona, document and guardrails file
    #[arg(long)]
    check_prompts: bool,
}

pub async fn execute(global: &GlobalArgs, args: ValidateArgs) -> Result<()> {
    info!("Validating configuration: {}", global.config.display());

    let raw = ConfigLoader::read(&global.config)?;
    let result = ConfigValidator::validate(&raw);

    println!("📋 Validating {}...", global.config.display());
    for warning in &result.warnings {
        println!("   ⚠️  {}", warning);
    }

    if !result.valid {
        println!("   ❌ Configuration is invalid:");
        for error in &result.errors {
            println!("      - {}", error);
        }
        let first = result.first_error().map(|i| i.field.clone()).unwrap_or_default();
        return Err(ConfigError::invalid(
            first,
            format!("{} problem(s) found", result.errors.len()),
        )
        .into());
    }
    println!(
        "   ✅ {} agent(s), {} section(s)",
        raw.agents.len(),
        raw.sections.len()
    );

    if args.check_prompts {
        println!("📄 Loading prompts from {}...", global.prompt_root().display());
        let settings = global.load_settings()?;
        let registry = global.load_registry(&settings)?;
        println!("   ✅ All prompts for {} agent(s) loaded", registry.len());
    }

    println!();
    println!("✅ Configuration is valid!");
    Ok(())
}
