//! Chat sessions: one caller, one current agent, one conversation.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{ChatError, ChatResult};
use crate::prompt::sanitize_user_prompt;
use crate::service::ChatService;
use crate::stream::ReplyStream;
use crate::types::Conversation;

/// Slash commands understood by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// `/list`: agents this caller may use
    List,
    /// `/switch <agent>`
    Switch(String),
    /// `/current`
    Current,
    /// `/reset` or `/clear`: drop the conversation
    Reset,
    /// `/help`
    Help,
    /// Well-formed command with bad arguments
    Usage(&'static str),
    /// Anything else starting with `/`
    Unknown(String),
}

impl SessionCommand {
    /// Parse a line of input; `None` when it is an ordinary message.
    pub fn parse(input: &str) -> Option<Self> {
        let rest = input.trim().strip_prefix('/')?;
        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default().to_lowercase();

        let command = match name.as_str() {
            "list" => Self::List,
            "current" => Self::Current,
            "reset" | "clear" => Self::Reset,
            "help" => Self::Help,
            "switch" => match parts.next() {
                Some(agent) => Self::Switch(agent.to_string()),
                None => Self::Usage("Usage: /switch <agent>"),
            },
            _ => Self::Unknown(name),
        };
        Some(command)
    }
}

const HELP: &str = "Available commands:\n\
  /switch <agent>  Switch to a specific agent\n\
  /list            Show the agents you can use\n\
  /current         Show the active agent\n\
  /reset           Clear the conversation\n\
  /help            Show this help message";

/// One caller's chat state.
///
/// Only the session mutates its conversation; the shared service is read-only.
#[derive(Debug)]
pub struct ChatSession {
    id: String,
    service: Arc<ChatService>,
    is_admin: bool,
    current_agent: String,
    conversation: Conversation,
    /// Conversation including the user turn whose reply is still streaming
    pending: Option<Conversation>,
}

impl ChatSession {
    /// Start a session on the caller's default agent.
    pub fn new(service: Arc<ChatService>, is_admin: bool) -> ChatResult<Self> {
        let catalog = service.catalog();
        let agent = catalog
            .default_agent(is_admin)
            .or_else(|| catalog.ids().first().copied())
            .ok_or_else(|| ChatError::AgentNotFound("<default>".to_string()))?
            .to_string();
        Self::with_agent(service, agent, is_admin)
    }

    /// Start a session on a specific agent.
    pub fn with_agent(service: Arc<ChatService>, agent: impl Into<String>, is_admin: bool) -> ChatResult<Self> {
        let agent = agent.into();
        check_available(&service, &agent, is_admin)?;

        let session = Self {
            id: uuid::Uuid::new_v4().to_string(),
            service,
            is_admin,
            current_agent: agent,
            conversation: Conversation::new(),
            pending: None,
        };
        info!(session = %session.id, agent = %session.current_agent, "Chat session started");
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn current_agent(&self) -> &str {
        &self.current_agent
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Send a user message to the current agent.
    ///
    /// The user turn is held back until [`ChatSession::complete_reply`]
    /// records the answer; a reply that errors or is abandoned leaves the
    /// conversation as it was. Sending again discards an unfinished reply.
    pub async fn send(&mut self, input: &str) -> ChatResult<ReplyStream> {
        if self.pending.take().is_some() {
            debug!(session = %self.id, "Discarding unfinished reply");
        }

        let mut next = self.conversation.clone();
        next.push_user(sanitize_user_prompt(input));

        let reply = self.service.handle(&self.current_agent, &next).await?;
        self.pending = Some(next);
        Ok(reply)
    }

    /// Record the assistant's full reply together with its user turn.
    pub fn complete_reply(&mut self, text: impl Into<String>) {
        match self.pending.take() {
            Some(mut next) => {
                next.push_assistant(text);
                self.conversation = next;
            }
            None => debug!(session = %self.id, "No reply in progress, ignoring"),
        }
    }

    /// Drop the reply in progress and its user turn.
    pub fn abort_reply(&mut self) {
        if self.pending.take().is_some() {
            debug!(session = %self.id, "Reply aborted, user turn dropped");
        }
    }

    /// Whether a sent message still awaits [`ChatSession::complete_reply`].
    pub fn has_pending_reply(&self) -> bool {
        self.pending.is_some()
    }

    /// Change the current agent, keeping the conversation.
    pub fn switch(&mut self, agent: &str) -> ChatResult<()> {
        check_available(&self.service, agent, self.is_admin)?;
        debug!(session = %self.id, from = %self.current_agent, to = %agent, "Switching agent");
        self.current_agent = agent.to_string();
        Ok(())
    }

    pub fn reset(&mut self) {
        self.conversation = Conversation::new();
        self.pending = None;
    }

    /// Run a slash command and return the text to show the caller.
    pub fn execute(&mut self, command: SessionCommand) -> ChatResult<String> {
        match command {
            SessionCommand::List => Ok(self.list()),
            SessionCommand::Switch(agent) => {
                self.switch(&agent)?;
                Ok(format!("Switched to {}", self.describe(&agent)))
            }
            SessionCommand::Current => Ok(format!("Current agent: {}", self.describe(&self.current_agent))),
            SessionCommand::Reset => {
                self.reset();
                Ok("Conversation cleared.".to_string())
            }
            SessionCommand::Help => Ok(HELP.to_string()),
            SessionCommand::Usage(usage) => Ok(usage.to_string()),
            SessionCommand::Unknown(name) => Ok(format!(
                "Unknown command: /{}. Type /help for available commands.",
                name
            )),
        }
    }

    fn list(&self) -> String {
        let catalog = self.service.catalog();
        let mut lines = Vec::new();

        for section in catalog.sections() {
            let pages: Vec<_> = section
                .pages
                .iter()
                .filter(|p| p.is_visible_to(self.is_admin))
                .collect();
            if pages.is_empty() {
                continue;
            }
            lines.push(format!("{}:", section.name));
            for page in pages {
                let marker = if page.agent == self.current_agent { "*" } else { " " };
                lines.push(format!("{} {} {} ({})", marker, page.icon, page.title, page.agent));
                if !page.subtitle.is_empty() {
                    lines.push(format!("    {}", page.subtitle));
                }
            }
        }

        if lines.is_empty() {
            for id in catalog.ids() {
                let marker = if id == self.current_agent { "*" } else { " " };
                lines.push(format!("{} {}", marker, id));
            }
        }
        lines.join("\n")
    }

    fn describe(&self, agent: &str) -> String {
        match self.service.catalog().page_for(agent, self.is_admin) {
            Some(page) => format!("{} {} ({})", page.icon, page.title, agent),
            None => agent.to_string(),
        }
    }
}

/// Agents behind a visible page are available; a catalog without pages
/// exposes every agent.
fn check_available(service: &ChatService, agent: &str, is_admin: bool) -> ChatResult<()> {
    let catalog = service.catalog();
    if !catalog.contains(agent) {
        return Err(ChatError::AgentNotFound(agent.to_string()));
    }
    let has_pages = catalog.pages().next().is_some();
    if has_pages && !catalog.is_available(agent, is_admin) {
        return Err(ChatError::AgentUnavailable(agent.to_string()));
    }
    Ok(())
}
