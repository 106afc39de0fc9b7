//! Production configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ECOPROM_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `ECOPROM_DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `ECOPROM_LOG_JSON` - Emit JSON logs when `1`/`true`
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry error sample rate (default: 1.0)
//!
//! ## Optional (Telegram - enables channel messages)
//! - `TELEGRAM_BOT_TOKEN` - Bot API token (`123456789:AA...`)
//! - `TELEGRAM_CHAT_ID` - Numeric chat ID or `@channel` name

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::telegram::TelegramClient;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Production core configuration.
#[derive(Debug, Clone)]
pub struct ProductionConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Upper bound on pooled connections
    pub max_connections: u32,
    /// Telegram channel configuration (optional)
    pub telegram: Option<TelegramConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Emit JSON-formatted logs
    pub log_json: bool,
}

/// Telegram channel configuration.
///
/// Implements `Debug` manually to redact the bot token.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot API token.
    pub bot_token: SecretString,
    /// Chat that receives channel messages.
    pub chat_id: String,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl TelegramConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_values(
            get_optional_env("TELEGRAM_BOT_TOKEN"),
            get_optional_env("TELEGRAM_CHAT_ID"),
        )
    }

    /// Build from raw values. Both must be present, or neither.
    fn from_values(
        bot_token: Option<String>,
        chat_id: Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        match (bot_token, chat_id) {
            (Some(token), Some(chat_id)) => {
                if let Err(e) = validate_secret_strength(&token, "TELEGRAM_BOT_TOKEN") {
                    tracing::warn!("TELEGRAM_BOT_TOKEN validation warning: {e}");
                }
                validate_chat_id(&chat_id)?;
                Ok(Some(Self {
                    bot_token: SecretString::from(token),
                    chat_id,
                }))
            }
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "TELEGRAM_*".to_string(),
                "Both TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID must be set together".to_string(),
            )),
        }
    }

    /// Build a client for this chat.
    #[must_use]
    pub fn client(&self) -> TelegramClient {
        TelegramClient::new(
            SecretString::from(self.bot_token.expose_secret().to_owned()),
            self.chat_id.clone(),
        )
    }
}

impl ProductionConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("ECOPROM_DATABASE_URL")?;
        let max_connections = parse_max_connections(get_optional_env("ECOPROM_DB_MAX_CONNECTIONS"))?;
        let telegram = TelegramConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let log_json = parse_flag(get_optional_env("ECOPROM_LOG_JSON").as_deref());

        Ok(Self {
            database_url,
            max_connections,
            telegram,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            log_json,
        })
    }

    /// Returns a reference to the Telegram configuration, if available.
    ///
    /// Returns `None` if Telegram variables are not set, which disables
    /// channel messages.
    #[must_use]
    pub const fn telegram(&self) -> Option<&TelegramConfig> {
        self.telegram.as_ref()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_max_connections(value: Option<String>) -> Result<u32, ConfigError> {
    let Some(value) = value else {
        return Ok(DEFAULT_MAX_CONNECTIONS);
    };
    match value.trim().parse::<u32>() {
        Ok(0) => Err(ConfigError::InvalidEnvVar(
            "ECOPROM_DB_MAX_CONNECTIONS".to_string(),
            "must be at least 1".to_string(),
        )),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::InvalidEnvVar(
            "ECOPROM_DB_MAX_CONNECTIONS".to_string(),
            e.to_string(),
        )),
    }
}

fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// A chat ID is a (possibly negative) integer or an `@channel` username.
fn validate_chat_id(chat_id: &str) -> Result<(), ConfigError> {
    let valid = chat_id.parse::<i64>().is_ok()
        || chat_id
            .strip_prefix('@')
            .is_some_and(|name| !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidEnvVar(
            "TELEGRAM_CHAT_ID".to_string(),
            format!("expected a numeric ID or @channel, got {chat_id:?}"),
        ))
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the token issued by BotFather."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TOKEN: &str = "7012345678:AAHk3vQ9x_Lr2mZpT8bN4cW1yD6fJ0sGuEo";

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-bot-token-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("1111111111:AAAAAAAAAAAAAAAA", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_real_token() {
        assert!(validate_secret_strength(TOKEN, "TELEGRAM_BOT_TOKEN").is_ok());
    }

    #[test]
    fn test_telegram_both_or_neither() {
        assert!(TelegramConfig::from_values(None, None).unwrap().is_none());
        assert!(matches!(
            TelegramConfig::from_values(Some(TOKEN.to_owned()), None),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(matches!(
            TelegramConfig::from_values(None, Some("-100123".to_owned())),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));

        let config = TelegramConfig::from_values(Some(TOKEN.to_owned()), Some("-1001234567890".to_owned()))
            .unwrap()
            .unwrap();
        assert_eq!(config.chat_id, "-1001234567890");
        assert_eq!(config.client().chat_id(), "-1001234567890");
    }

    #[test]
    fn test_chat_id_forms() {
        assert!(validate_chat_id("-1001234567890").is_ok());
        assert!(validate_chat_id("@ecoprom_ishlab").is_ok());
        assert!(validate_chat_id("@").is_err());
        assert!(validate_chat_id("eco prom").is_err());
    }

    #[test]
    fn test_max_connections() {
        assert_eq!(parse_max_connections(None).unwrap(), DEFAULT_MAX_CONNECTIONS);
        assert_eq!(parse_max_connections(Some("25".to_owned())).unwrap(), 25);
        assert!(parse_max_connections(Some("0".to_owned())).is_err());
        assert!(parse_max_connections(Some("many".to_owned())).is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(Some("1")));
        assert!(parse_flag(Some("TRUE")));
        assert!(!parse_flag(Some("0")));
        assert!(!parse_flag(None));
    }

    #[test]
    fn test_telegram_config_debug_redacts_token() {
        let config = TelegramConfig {
            bot_token: SecretString::from(TOKEN),
            chat_id: "-100555".to_string(),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("-100555"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("AAHk3vQ9x"));
    }
}
