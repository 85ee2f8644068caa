use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::client::TelegramClient;
use super::commands::{CommandHandler, IncomingMessage};
use super::types::Update;
use crate::publisher::Messenger;
use crate::utils::error::Result;

const POLL_RETRY_PAUSE: Duration = Duration::from_secs(5);

/// Long-polls the Bot API and dispatches each update to the command handler
/// on its own task.
pub struct CommandListener {
    client: TelegramClient,
    handler: Arc<CommandHandler>,
    poll_timeout_secs: u64,
    skip_pending: bool,
}

impl CommandListener {
    pub fn new(
        client: TelegramClient,
        handler: Arc<CommandHandler>,
        poll_timeout: Duration,
        skip_pending: bool,
    ) -> Self {
        Self {
            client,
            handler,
            poll_timeout_secs: poll_timeout.as_secs(),
            skip_pending,
        }
    }

    /// Polls until the task is dropped. Poll failures are logged and retried
    /// after a pause.
    pub async fn run(&self) {
        let mut offset = None;

        if self.skip_pending {
            match self.client.skip_pending_updates().await {
                Ok(next) => offset = next,
                Err(e) => tracing::warn!("Could not skip pending updates: {}", e),
            }
        }

        tracing::info!("Listening for commands");
        loop {
            if let Err(e) = self.poll_once(&mut offset).await {
                tracing::error!("Polling failed: {}", e);
                tokio::time::sleep(POLL_RETRY_PAUSE).await;
            }
        }
    }

    /// Fetches one batch of updates, advances `offset` past it and spawns a
    /// handler task per update.
    pub async fn poll_once(&self, offset: &mut Option<i64>) -> Result<Vec<JoinHandle<()>>> {
        let updates = self.client.get_updates(*offset, self.poll_timeout_secs).await?;

        let mut tasks = Vec::with_capacity(updates.len());
        for update in updates {
            *offset = Some(update.update_id + 1);

            let handler = self.handler.clone();
            let messenger: Arc<dyn Messenger> = Arc::new(self.client.clone());
            tasks.push(tokio::spawn(async move {
                dispatch(&handler, messenger.as_ref(), update).await;
            }));
        }

        Ok(tasks)
    }
}

pub async fn dispatch(handler: &CommandHandler, messenger: &dyn Messenger, update: Update) {
    let Some(message) = update.message.as_ref().and_then(IncomingMessage::from_message) else {
        return;
    };

    let Some(reply) = handler.handle(&message).await else {
        return;
    };

    if let Err(e) = messenger.reply(&message.chat_id, message.message_id, &reply).await {
        tracing::error!("Failed to reply in chat {}: {}", message.chat_id, e);
    }
}
