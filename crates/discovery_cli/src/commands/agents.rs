//! Agents command - List agents and the pages that expose them.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use discovery_config::{AgentCatalog, AgentKind, Page};

use super::GlobalArgs;

#[derive(Args, Debug)]
pub struct AgentsArgs {
    /// Include admin-only pages
    #[arg(long)]
    admin: bool,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct AgentListing<'a> {
    id: &'a str,
    kind: AgentKind,
    model: &'a str,
    temperature: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    routes: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct SectionListing<'a> {
    name: &'a str,
    pages: Vec<&'a Page>,
}

#[derive(Debug, Serialize)]
struct Listing<'a> {
    #[serde(rename = "defaultAgent")]
    default_agent: Option<&'a str>,
    agents: Vec<AgentListing<'a>>,
    sections: Vec<SectionListing<'a>>,
}

fn listing(catalog: &AgentCatalog, is_admin: bool) -> Listing<'_> {
    let agents = catalog
        .agents()
        .map(|a| AgentListing {
            id: &a.id,
            kind: a.kind,
            model: &a.model,
            temperature: a.temperature,
            routes: a
                .routing
                .as_ref()
                .map(|r| r.targets().collect())
                .unwrap_or_default(),
        })
        .collect();

    let sections = catalog
        .sections()
        .iter()
        .map(|s| SectionListing {
            name: &s.name,
            pages: s.pages.iter().filter(|p| p.is_visible_to(is_admin)).collect(),
        })
        .filter(|s| !s.pages.is_empty())
        .collect();

    Listing {
        default_agent: catalog.default_agent(is_admin),
        agents,
        sections,
    }
}

pub async fn execute(global: &GlobalArgs, args: AgentsArgs) -> Result<()> {
    let catalog = global.load_catalog()?;
    let listing = listing(&catalog, args.admin);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("🤖 Agents:");
    for agent in &listing.agents {
        let routes = if agent.routes.is_empty() {
            String::new()
        } else {
            format!(" → {}", agent.routes.join(", "))
        };
        println!(
            "   {:<28} {:<15} {} @ {}{}",
            agent.id,
            agent.kind.as_str(),
            agent.model,
            agent.temperature,
            routes
        );
    }

    for section in &listing.sections {
        println!();
        println!("📂 {}", section.name);
        for page in &section.pages {
            let marker = if Some(page.agent.as_str()) == listing.default_agent { "*" } else { " " };
            println!("  {} {} {} (/{}) → {}", marker, page.icon, page.title, page.url_path, page.agent);
            if !page.subtitle.is_empty() && !global.quiet {
                println!("      {}", page.subtitle);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_config::ConfigLoader;

    const CONFIG: &str = r#"
agents:
  facilitator:
    persona: facilitator.md
    document: cards.md
  prompt_lab:
    persona: lab.md
    document: cards.md
sections:
  Admin:
    - { type: agent, agent: prompt_lab, title: Lab, icon: ":test_tube:", url_path: lab, header: Lab, subtitle: "", admin_only: true }
  Workshop:
    - { type: agent, agent: facilitator, title: Facilitator, icon: ":teacher:", url_path: facilitator, header: Facilitator, subtitle: Guides you }
"#;

    #[test]
    fn test_listing_filters_admin_sections() {
        let catalog = ConfigLoader::load_str(CONFIG).unwrap();

        let public = listing(&catalog, false);
        assert_eq!(public.default_agent, Some("facilitator"));
        assert_eq!(public.sections.len(), 1);
        assert_eq!(public.agents.len(), 2);

        let admin = listing(&catalog, true);
        assert_eq!(admin.default_agent, Some("prompt_lab"));
        assert_eq!(admin.sections.len(), 2);
    }
}
