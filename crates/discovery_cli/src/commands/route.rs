//! Route command - Dry-run the routing dispatcher.

use anyhow::Result;
use clap::Args;
use tracing::info;

use discovery_chat::{sanitize_user_prompt, Conversation, RoutePlan};
use discovery_config::ProviderKind;

use super::GlobalArgs;

#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Agent that receives the message
    #[arg(short, long)]
    agent: String,

    /// The user message to classify
    #[arg(short, long)]
    message: String,

    /// Earlier user turns, oldest first
    #[arg(long = "history")]
    history: Vec<String>,

    /// Completion provider for classification
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// Maximum routing hops
    #[arg(long)]
    max_hops: Option<usize>,

    /// Print the plan as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(global: &GlobalArgs, args: RouteArgs) -> Result<()> {
    let mut settings = global.load_settings()?;
    if let Some(provider) = args.provider {
        settings.provider = provider;
    }
    if let Some(max_hops) = args.max_hops {
        settings.max_route_hops = max_hops;
    }
    settings.validate()?;

    let service = global.build_service(&settings)?;

    let mut conversation = Conversation::new();
    for turn in &args.history {
        conversation.push_user(sanitize_user_prompt(turn));
    }
    conversation.push_user(sanitize_user_prompt(&args.message));

    info!("Resolving route for agent {}", args.agent);
    let plan = service.resolve(&args.agent, &conversation).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print_plan(&plan);
    }
    Ok(())
}

fn print_plan(plan: &RoutePlan) {
    if plan.is_direct() {
        println!("🎯 {} answers directly", plan.leaf);
        return;
    }
    println!("🧭 {}", plan.path().join(" → "));
    for hop in &plan.hops {
        println!("   {} chose `{}` → {}", hop.agent, hop.label, hop.target);
    }
    println!("🎯 {} answers", plan.leaf);
}
