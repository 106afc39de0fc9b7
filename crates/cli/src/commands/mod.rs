//! Command implementations.
//!
//! Every command that touches the database receives a [`Context`] built once
//! in `main`. Commands that change data also need an acting user, named with
//! the global `--as <username>` flag.

pub mod deadlines;
pub mod inbox;
pub mod inventory;
pub mod migrate;
pub mod orders;
pub mod users;

use eco_prom_production::config::{ConfigError, ProductionConfig};
use eco_prom_production::db::{self, RepositoryError, UserRepository};
use eco_prom_production::services::{Actor, Notifier};
use eco_prom_production::{LedgerError, OrderError};
use sqlx::PgPool;
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Order operation was rejected.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Stock operation was rejected.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// JSON input or output failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The command changes data but no `--as` user was given.
    #[error("This command needs an acting user: pass --as <username>")]
    MissingActor,

    /// No user with that username.
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// The user exists but is deactivated.
    #[error("User is inactive: {0}")]
    InactiveUser(String),

    /// No order with that number.
    #[error("Unknown order: {0}")]
    UnknownOrder(String),

    /// A value given on the command line is invalid.
    #[error("Invalid {0}: {1}")]
    InvalidArgument(&'static str, String),
}

/// Shared state for database-backed commands.
#[derive(Debug, Clone)]
pub struct Context {
    pub pool: PgPool,
    pub notifier: Notifier,
    actor: Option<String>,
}

impl Context {
    /// Connect to the database and build the notifier from configuration.
    pub async fn connect(
        config: &ProductionConfig,
        actor: Option<String>,
    ) -> Result<Self, CommandError> {
        let pool = db::create_pool(&config.database_url, config.max_connections).await?;
        tracing::debug!("Database pool created");

        let telegram = config.telegram().map(|t| t.client());
        if telegram.is_none() {
            tracing::debug!("Telegram not configured, channel messages disabled");
        }
        let notifier = Notifier::new(pool.clone(), telegram);

        Ok(Self {
            pool,
            notifier,
            actor,
        })
    }

    /// Resolve the `--as` user into an actor.
    pub async fn actor(&self) -> Result<Actor, CommandError> {
        let username = self.actor.as_deref().ok_or(CommandError::MissingActor)?;
        let user = UserRepository::new(&self.pool)
            .get_by_username(username)
            .await?
            .ok_or_else(|| CommandError::UnknownUser(username.to_owned()))?;
        if !user.active {
            return Err(CommandError::InactiveUser(username.to_owned()));
        }
        Ok(Actor::new(user.id, user.role))
    }
}

/// Write a value to stdout as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CommandError> {
    let rendered = serde_json::to_string_pretty(value)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{rendered}");
    }
    Ok(())
}
