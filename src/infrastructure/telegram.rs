//! Доставка уведомлений через Telegram Bot API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::domain::notify::NotificationSender;
use crate::shared::errors::NotifyError;

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

pub struct TelegramSender {
    client: reqwest::Client,
    api_url: String,
}

impl TelegramSender {
    pub fn new(bot_token: &str) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        Ok(Self {
            client,
            api_url: format!("https://api.telegram.org/bot{}/sendMessage", bot_token),
        })
    }
}

#[async_trait]
impl NotificationSender for TelegramSender {
    async fn send(&self, recipient: i64, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.api_url)
            .json(&SendMessageRequest {
                chat_id: recipient,
                text,
            })
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Api(status.as_u16()));
        }

        debug!("Telegram message delivered to chat {}", recipient);
        Ok(())
    }
}
