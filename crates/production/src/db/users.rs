//! Database operations for users and worker bindings.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use eco_prom_core::{Role, UserId, WorkerId, WorkerType};

use super::{RepositoryError, parse_column};
use crate::models::{NewUser, NewWorker, User, Worker};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    username: String,
    display_name: String,
    role: String,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::new(row.id),
            username: row.username,
            display_name: row.display_name,
            role: parse_column(&row.role)?,
            active: row.active,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct WorkerRow {
    id: i32,
    user_id: i32,
    worker_type: String,
    active: bool,
}

impl TryFrom<WorkerRow> for Worker {
    type Error = RepositoryError;

    fn try_from(row: WorkerRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: WorkerId::new(row.id),
            user_id: UserId::new(row.user_id),
            worker_type: parse_column(&row.worker_type)?,
            active: row.active,
        })
    }
}

const USER_COLUMNS: &str = "id, username, display_name, role, active, created_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for user and worker database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username is taken.
    pub async fn create_user(&self, input: &NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO app_user (username, display_name, role)
             VALUES ($1, $2, $3)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&input.username)
        .bind(&input.display_name)
        .bind(input.role.as_str())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "username already exists"))?;

        row.try_into()
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM app_user WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a user by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM app_user WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// IDs of active users holding any of the given roles.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_user_ids_with_roles(
        &self,
        roles: &[Role],
    ) -> Result<Vec<UserId>, RepositoryError> {
        let roles: Vec<String> = roles.iter().map(|r| r.as_str().to_owned()).collect();
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM app_user WHERE active AND role = ANY($1) ORDER BY id",
        )
        .bind(roles)
        .fetch_all(self.pool)
        .await?;

        Ok(ids.into_iter().map(UserId::new).collect())
    }

    /// Bind a user to a production role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already has a binding.
    pub async fn create_worker(&self, input: NewWorker) -> Result<Worker, RepositoryError> {
        let row = sqlx::query_as::<_, WorkerRow>(
            "INSERT INTO worker (user_id, worker_type)
             VALUES ($1, $2)
             RETURNING id, user_id, worker_type, active",
        )
        .bind(input.user_id)
        .bind(input.worker_type.as_str())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "user is already a worker"))?;

        row.try_into()
    }

    /// Activate or deactivate a worker.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the worker does not exist.
    pub async fn set_worker_active(
        &self,
        id: WorkerId,
        active: bool,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE worker SET active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

// =============================================================================
// Transaction-scoped queries
// =============================================================================

/// Active workers of a given type whose user is also active.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn active_workers_of_type(
    conn: &mut PgConnection,
    worker_type: WorkerType,
) -> Result<Vec<Worker>, RepositoryError> {
    let rows = sqlx::query_as::<_, WorkerRow>(
        "SELECT w.id, w.user_id, w.worker_type, w.active
         FROM worker w
         JOIN app_user u ON u.id = w.user_id
         WHERE w.worker_type = $1 AND w.active AND u.active
         ORDER BY w.id",
    )
    .bind(worker_type.as_str())
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}
