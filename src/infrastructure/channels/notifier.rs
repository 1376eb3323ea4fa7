//! Alert delivery to the operator channel

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::shared::errors::DeliveryError;

/// Delivers plain-text messages. Best-effort: callers log failures and move on.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError>;
}

/// Writes alerts to the log only. Used for dry runs and when no chat is configured.
#[derive(Debug, Clone, Default)]
pub struct LogDispatcher;

#[async_trait]
impl AlertDispatcher for LogDispatcher {
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
        info!("📣 ALERT\n{}", message);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API `sendMessage`
pub struct TelegramDispatcher {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramDispatcher {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>, chat_id: impl Into<String>, timeout_secs: u64) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[async_trait]
impl AlertDispatcher for TelegramDispatcher {
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text: message,
            disable_web_page_preview: true,
        };

        // The endpoint embeds the bot token, keep it out of error text
        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body: SendMessageResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::Transport(format!("unreadable response ({}): {}", status, e.without_url())))?;

        if !status.is_success() || !body.ok {
            return Err(DeliveryError::Rejected(
                body.description.unwrap_or_else(|| status.to_string()),
            ));
        }
        Ok(())
    }
}
