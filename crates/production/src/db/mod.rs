//! Database operations for the production `PostgreSQL` schema.
//!
//! ## Tables
//!
//! - `app_user` / `worker` - Identities, authorization roles and worker bindings
//! - `production_order` - Orders, their specs, status and one-shot alert flags
//! - `order_number_sequence` - Per-year order number counter
//! - `order_worker` - Order assignments
//! - `order_event` - Audit trail of committed transitions
//! - `category` / `material` - Stocked items and their running quantity
//! - `stock_transaction` - Append-only stock journal
//! - `notification` - In-app notification inbox
//!
//! # Migrations
//!
//! Migrations are stored in `crates/production/migrations/` and run via:
//! ```bash
//! cargo run -p eco-prom-cli -- migrate
//! ```
//!
//! Functions that take a `&mut PgConnection` are meant to run inside a
//! caller-owned transaction; repositories holding a `&PgPool` are for
//! standalone reads and writes.

pub mod materials;
pub mod notifications;
pub mod orders;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use materials::MaterialRepository;
pub use notifications::NotificationRepository;
pub use orders::OrderRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate material name).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A journal entry already carries this batch code.
    #[error("batch code {0} already exists")]
    BatchCodeTaken(String),
}

impl RepositoryError {
    /// Map a unique violation to [`RepositoryError::Conflict`], passing any
    /// other error through as [`RepositoryError::Database`].
    pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }

    /// Map a foreign key violation to [`RepositoryError::Conflict`].
    pub(crate) fn conflict_on_foreign_key(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_foreign_key_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }
}

/// Parse a text column into one of the core enums.
pub(crate) fn parse_column<T>(value: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| RepositoryError::DataCorruption(e.to_string()))
}

/// Create a `PostgreSQL` connection pool.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
/// * `max_connections` - Upper bound on pooled connections
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use eco_prom_core::{OrderStatus, Role};

    use super::*;

    #[test]
    fn test_parse_column_ok() {
        let status: OrderStatus = parse_column("USTA_TUGATDI").expect("valid status");
        assert_eq!(status, OrderStatus::UstaTugatdi);
    }

    #[test]
    fn test_parse_column_corrupt() {
        let result: Result<Role, _> = parse_column("root");
        assert!(matches!(result, Err(RepositoryError::DataCorruption(msg)) if msg.contains("root")));
    }
}
