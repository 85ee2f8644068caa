use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::models::{ChatId, Deal};
use crate::utils::error::Result;

pub const TITLE_MARKER: &str = "🔥";
pub const LINK_MARKER: &str = "👉";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub message_id: i64,
}

/// Outbound side of the messaging platform.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<SentMessage>;

    /// Sends `text` as a reply to `reply_to` in `chat_id`.
    async fn reply(&self, chat_id: &ChatId, reply_to: i64, text: &str) -> Result<SentMessage>;
}

/// Renders deals and posts them to the destination channel, pausing after
/// every successful post.
pub struct Publisher {
    messenger: Arc<dyn Messenger>,
    channel: ChatId,
    delay: Duration,
}

impl Publisher {
    pub fn new(messenger: Arc<dyn Messenger>, channel: ChatId, delay: Duration) -> Self {
        Self {
            messenger,
            channel,
            delay,
        }
    }

    pub fn render(deal: &Deal, link: &str) -> String {
        format!("{} {}\n{} {}", TITLE_MARKER, deal.title, LINK_MARKER, link)
    }

    /// Posts one deal. Failures are returned to the caller, which logs them
    /// and moves on; nothing is retried here.
    pub async fn publish(&self, deal: &Deal, link: &str) -> Result<SentMessage> {
        let text = Self::render(deal, link);
        let sent = self.messenger.send_message(&self.channel, &text).await?;

        tracing::debug!("Posted message {} to {}", sent.message_id, self.channel);
        tokio::time::sleep(self.delay).await;

        Ok(sent)
    }
}
