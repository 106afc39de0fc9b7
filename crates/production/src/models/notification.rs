//! In-app notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use eco_prom_core::{NotificationId, OrderId, UserId};

/// A message in a user's notification inbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    /// Order the message is about, if any.
    pub order_id: Option<OrderId>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
