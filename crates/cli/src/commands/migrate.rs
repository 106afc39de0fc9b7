//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! ecoprom migrate
//! ```
//!
//! # Environment Variables
//!
//! - `ECOPROM_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Migrations live in `crates/production/migrations/` and are embedded into
//! the binary at build time:
//! ```text
//! migrations/
//! ├── 20260301000001_create_people.sql
//! ├── 20260301000002_create_orders.sql
//! └── 20260301000003_create_inventory.sql
//! ```

use sqlx::PgPool;

use super::CommandError;

/// Run the production schema migrations.
pub async fn run(pool: &PgPool) -> Result<(), CommandError> {
    tracing::info!("Running production migrations...");
    sqlx::migrate!("../production/migrations").run(pool).await?;
    tracing::info!("Production migrations complete");
    Ok(())
}
