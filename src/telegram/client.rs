use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

use super::types::{Message, TelegramResponse, Update, User};
use crate::config::TelegramConfig;
use crate::models::ChatId;
use crate::publisher::{Messenger, SentMessage};
use crate::utils::error::{AppError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimal Telegram Bot API client: identity, sending and long polling.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_base: String,
    token: String,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("dealcast/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        Self::new(&config.api_base_url, &config.bot_token)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T> {
        // Request errors embed the URL, which carries the bot token.
        let api_error = |message: String| AppError::Telegram {
            method: method.to_string(),
            message,
        };

        let mut request = self.client.post(self.method_url(method)).json(&payload);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| api_error(e.without_url().to_string()))?;
        let status = response.status();

        let body: TelegramResponse<T> = response
            .json()
            .await
            .map_err(|e| api_error(format!("HTTP {}: {}", status, e.without_url())))?;

        if !body.ok {
            return Err(api_error(
                body.description
                    .unwrap_or_else(|| format!("HTTP {}", status)),
            ));
        }

        body.result
            .ok_or_else(|| api_error("response did not include a result".to_string()))
    }

    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", json!({}), None).await
    }

    pub async fn send_text(
        &self,
        chat_id: &ChatId,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<Message> {
        let mut payload = json!({
            "chat_id": chat_id.as_str(),
            "text": text,
        });

        if let Some(message_id) = reply_to {
            payload["reply_to_message_id"] = json!(message_id);
        }

        self.call("sendMessage", payload, None).await
    }

    /// Long-polls for updates with `update_id >= offset`.
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let mut payload = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });

        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }

        // The HTTP timeout has to outlast the server-side long poll.
        let http_timeout = Duration::from_secs(timeout_secs) + REQUEST_TIMEOUT;
        self.call("getUpdates", payload, Some(http_timeout)).await
    }

    /// Acknowledges everything queued so far. Returns the next offset to poll.
    pub async fn skip_pending_updates(&self) -> Result<Option<i64>> {
        let pending = self.get_updates(Some(-1), 0).await?;
        Ok(pending.last().map(|u| u.update_id + 1))
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<SentMessage> {
        let message = self
            .send_text(chat_id, text, None)
            .await
            .map_err(|e| AppError::Publish(e.to_string()))?;

        Ok(SentMessage {
            chat_id: chat_id.clone(),
            message_id: message.message_id,
        })
    }

    async fn reply(&self, chat_id: &ChatId, reply_to: i64, text: &str) -> Result<SentMessage> {
        let message = self.send_text(chat_id, text, Some(reply_to)).await?;

        Ok(SentMessage {
            chat_id: chat_id.clone(),
            message_id: message.message_id,
        })
    }
}
