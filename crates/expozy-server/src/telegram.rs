//! The chat transport's send side: a thin [`ChatClient`] that calls the Telegram Bot API's
//! `sendMessage` method, built the same way [`expozy_model::HttpModelAdapter`]
//! builds its outbound client — one `reqwest::Client`, reused for every call.

use async_trait::async_trait;
use expozy_core::{ChatClient, OrchestratorError, OrchestratorResult};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

pub struct TelegramChatClient {
    client: Client,
    bot_token: String,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

impl TelegramChatClient {
    pub fn new(bot_token: impl Into<String>) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            bot_token: bot_token.into(),
        })
    }
}

#[async_trait]
impl ChatClient for TelegramChatClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> OrchestratorResult<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let response = self
            .client
            .post(&url)
            .json(&SendMessageRequest { chat_id, text })
            .send()
            .await
            .map_err(|err| OrchestratorError::Internal(format!("telegram send failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::Internal(format!(
                "telegram sendMessage returned {status}: {body}"
            )));
        }
        Ok(())
    }
}
