//! Telegram-related errors.

use thiserror::Error;

/// Errors that can occur when posting to Telegram.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// HTTP request failed.
    #[error("Telegram request failed: {0}")]
    Request(String),

    /// Failed to parse response.
    #[error("Telegram response error: {0}")]
    Response(String),

    /// The Bot API returned `ok: false`.
    #[error("Telegram API error: {0}")]
    Api(String),
}
