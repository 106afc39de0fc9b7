//! Telegram Bot API client.

use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use super::error::TelegramError;

/// Telegram Bot API base URL.
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Upper bound on a single API call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Client posting to one Telegram chat.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    bot_token: SecretString,
    chat_id: String,
    api_base: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("bot_token", &"[REDACTED]")
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// Create a new Telegram client.
    #[must_use]
    pub fn new(bot_token: SecretString, chat_id: String) -> Self {
        Self {
            client: Client::new(),
            bot_token,
            chat_id,
            api_base: TELEGRAM_API_BASE.to_owned(),
        }
    }

    #[cfg(test)]
    fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// The chat messages are posted to.
    #[must_use]
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base.trim_end_matches('/'),
            self.bot_token.expose_secret()
        )
    }

    /// Post an HTML-formatted message to the chat.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Telegram rejects the message.
    #[instrument(skip(self, text), fields(chat_id = %self.chat_id))]
    pub async fn send_message(&self, text: &str) -> Result<(), TelegramError> {
        let message = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .timeout(REQUEST_TIMEOUT)
            .json(&message)
            .send()
            .await
            // Strip the URL: it embeds the bot token.
            .map_err(|e| TelegramError::Request(e.without_url().to_string()))?;

        let status = response.status();
        let result: ApiResponse = response
            .json()
            .await
            .map_err(|e| TelegramError::Response(format!("{status}: {}", e.without_url())))?;

        if !result.ok {
            error!(
                status = %status,
                error = ?result.description,
                "Telegram API error sending message"
            );
            return Err(TelegramError::Api(
                result
                    .description
                    .unwrap_or_else(|| "Unknown error".to_owned()),
            ));
        }

        debug!("Message posted to Telegram");

        Ok(())
    }
}
