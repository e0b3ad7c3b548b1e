//! Chat command - Talk to an agent.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use discovery_chat::{ChatError, ChatSession, SessionCommand};
use discovery_config::ProviderKind;

use super::GlobalArgs;

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Agent to start with (defaults to the first visible page)
    #[arg(short, long)]
    pub agent: Option<String>,

    /// Chat as an admin, unlocking admin-only pages
    #[arg(long)]
    pub admin: bool,

    /// Fail instead of answering with fallback text
    #[arg(long)]
    pub no_fallback: bool,

    /// Completion provider
    #[arg(long)]
    pub provider: Option<ProviderKind>,

    /// Maximum routing hops
    #[arg(long)]
    pub max_hops: Option<usize>,

    /// Send one message, print the reply and exit
    #[arg(short, long)]
    pub message: Option<String>,
}

pub async fn execute(global: &GlobalArgs, args: ChatArgs) -> Result<()> {
    let mut settings = global.load_settings()?;
    if let Some(provider) = args.provider {
        settings.provider = provider;
    }
    if args.no_fallback {
        settings.fallback = false;
    }
    if let Some(max_hops) = args.max_hops {
        settings.max_route_hops = max_hops;
    }
    settings.validate()?;

    let service = global.build_service(&settings)?;
    info!("Chatting via {} provider", service.provider_name());

    let mut session = match args.agent {
        Some(agent) => ChatSession::with_agent(service, agent, args.admin)?,
        None => ChatSession::new(service, args.admin)?,
    };

    if let Some(message) = args.message {
        return send(&mut session, &message).await;
    }

    println!("💬 Chatting with `{}`. Type /help for commands, /quit to leave.", session.current_agent());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{}> ", session.current_agent());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "/quit" | "/exit") {
            break;
        }

        if let Some(command) = SessionCommand::parse(line) {
            match session.execute(command) {
                Ok(output) => println!("{}", output),
                Err(e) => println!("❌ {}", e),
            }
            continue;
        }

        if let Err(e) = send(&mut session, line).await {
            report(&e);
        }
    }

    println!("👋 Bye");
    Ok(())
}

/// Send one message and stream the reply to stdout.
async fn send(session: &mut ChatSession, message: &str) -> Result<()> {
    let mut reply = session.send(message).await?;
    if !reply.plan().is_direct() {
        eprintln!("🧭 {}", reply.plan().path().join(" → "));
    }

    let mut stdout = std::io::stdout();
    let mut text = String::new();
    while let Some(fragment) = reply.next().await {
        let fragment = match fragment {
            Ok(fragment) => fragment,
            Err(e) => {
                writeln!(stdout)?;
                session.abort_reply();
                return Err(e.into());
            }
        };
        write!(stdout, "{}", fragment)?;
        stdout.flush()?;
        text.push_str(&fragment);
    }
    writeln!(stdout)?;

    session.complete_reply(text);
    Ok(())
}

fn report(error: &anyhow::Error) {
    println!("❌ {:#}", error);
    match error.downcast_ref::<ChatError>() {
        Some(e) if e.is_ambiguous() => {
            println!("   Try rephrasing, or /switch to a specific agent.")
        }
        Some(e) if e.is_retryable() => println!("   The completion service failed; try again."),
        _ => {}
    }
}
