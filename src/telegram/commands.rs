use std::sync::Arc;

use super::types::Message;
use crate::models::{ChatId, OwnerId, OwnerSet};
use crate::pipeline::{Pipeline, RunOutcome};
use crate::registry::SourceRegistry;
use crate::utils::error::AppError;

pub const PONG: &str = "🏓 Pong";
pub const ADD_SOURCE_USAGE: &str = "Usage: /addsource <url>";
pub const POSTED_NOW: &str = "✅ Posted deals now!";
pub const RUN_IN_PROGRESS: &str = "⏳ A posting run is already in progress";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    /// Argument text after the command, if any.
    AddSource(Option<String>),
    PostNow,
}

impl Command {
    /// Recognizes `/cmd` and `/cmd@bot`. Commands addressed to another bot,
    /// unknown commands and plain text yield `None`.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Command> {
        let text = text.trim_start();
        let rest = text.strip_prefix('/')?;

        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };

        let name = match head.split_once('@') {
            Some((name, target)) => {
                match bot_username {
                    Some(me) if target.eq_ignore_ascii_case(me) => {}
                    _ => return None,
                }
                name
            }
            None => head,
        };

        match name.to_ascii_lowercase().as_str() {
            "ping" => Some(Command::Ping),
            "addsource" => Some(Command::AddSource((!args.is_empty()).then(|| args.to_string()))),
            "postnow" => Some(Command::PostNow),
            _ => None,
        }
    }

    pub fn requires_owner(&self) -> bool {
        !matches!(self, Command::Ping)
    }
}

/// The parts of an inbound message the command surface cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub message_id: i64,
    pub sender: Option<OwnerId>,
    pub text: String,
}

impl IncomingMessage {
    pub fn from_message(message: &Message) -> Option<Self> {
        let text = message.text.clone()?;

        Some(Self {
            chat_id: ChatId::from(message.chat.id),
            message_id: message.message_id,
            sender: message.from.as_ref().map(|user| OwnerId(user.id)),
            text,
        })
    }
}

/// Owner-gated command dispatch. Returns the reply to send, or `None` when
/// the message warrants no answer at all.
pub struct CommandHandler {
    registry: SourceRegistry,
    pipeline: Arc<Pipeline>,
    owners: OwnerSet,
    bot_username: Option<String>,
}

impl CommandHandler {
    pub fn new(registry: SourceRegistry, pipeline: Arc<Pipeline>, owners: OwnerSet) -> Self {
        Self {
            registry,
            pipeline,
            owners,
            bot_username: None,
        }
    }

    pub fn with_bot_username(mut self, username: Option<String>) -> Self {
        self.bot_username = username;
        self
    }

    fn is_owner(&self, message: &IncomingMessage) -> bool {
        message.sender.is_some_and(|id| self.owners.is_owner(id))
    }

    pub async fn handle(&self, message: &IncomingMessage) -> Option<String> {
        let command = Command::parse(&message.text, self.bot_username.as_deref())?;

        // Unauthorized callers get no hint that the command exists.
        if command.requires_owner() && !self.is_owner(message) {
            tracing::debug!("Ignoring {:?} from non-owner {:?}", command, message.sender);
            return None;
        }

        let reply = match command {
            Command::Ping => PONG.to_string(),
            Command::AddSource(None) => ADD_SOURCE_USAGE.to_string(),
            Command::AddSource(Some(url)) => self.add_source(&url).await,
            Command::PostNow => self.post_now().await,
        };

        Some(reply)
    }

    async fn add_source(&self, url: &str) -> String {
        match self.registry.add(url).await {
            Ok(true) => format!("✅ Added source: {}", url),
            Ok(false) => format!("ℹ️ Source already registered: {}", url),
            Err(AppError::InvalidInput(_)) => ADD_SOURCE_USAGE.to_string(),
            Err(e) => {
                tracing::error!("Failed to add source {}: {}", url, e);
                format!("❌ Could not add source: {}", url)
            }
        }
    }

    async fn post_now(&self) -> String {
        tracing::info!("Immediate run requested");
        match self.pipeline.run_once().await {
            RunOutcome::Completed(_) => POSTED_NOW.to_string(),
            RunOutcome::Skipped => RUN_IN_PROGRESS.to_string(),
        }
    }
}
