//! Telegram channel integration.
//!
//! Order events that the whole shop floor should see (new orders, finished
//! work, missed deadlines) are posted to one shared chat through the Bot API
//! `sendMessage` method with HTML formatting.

mod client;
mod error;
mod messages;

pub use client::TelegramClient;
pub use error::TelegramError;
pub use messages::{
    build_deadline_breach_message, build_new_order_message, build_overdue_message,
    build_worker_finished_message, escape_html,
};
