//! Database operations for the in-app notification inbox.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use eco_prom_core::{NotificationId, OrderId, UserId};

use super::RepositoryError;
use crate::models::Notification;

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: i32,
    user_id: i32,
    order_id: Option<i32>,
    message: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: NotificationId::new(row.id),
            user_id: UserId::new(row.user_id),
            order_id: row.order_id.map(OrderId::new),
            message: row.message,
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}

/// Repository for notification inbox operations.
pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Put the same message in several inboxes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_many(
        &self,
        recipients: &[UserId],
        order: Option<OrderId>,
        message: &str,
    ) -> Result<u64, RepositoryError> {
        if recipients.is_empty() {
            return Ok(0);
        }
        let ids: Vec<i32> = recipients.iter().map(UserId::as_i32).collect();
        let result = sqlx::query(
            "INSERT INTO notification (user_id, order_id, message)
             SELECT UNNEST($1::int[]), $2, $3",
        )
        .bind(ids)
        .bind(order)
        .bind(message)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Unread notifications for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread(&self, user: UserId) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            "SELECT id, user_id, order_id, message, is_read, created_at
             FROM notification
             WHERE user_id = $1 AND NOT is_read
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Mark one of a user's notifications as read.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the notification does not
    /// belong to the user.
    pub async fn mark_read(&self, user: UserId, id: NotificationId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE notification SET is_read = TRUE WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
