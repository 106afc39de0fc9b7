//! Users and production worker bindings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use eco_prom_core::{Role, UserId, WorkerId, WorkerType};

/// An identity known to the production core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Name shown in notifications.
    pub display_name: String,
    /// Authorization role.
    pub role: Role,
    /// Inactive users receive no notifications and cannot act.
    pub active: bool,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    /// Login name (unique).
    pub username: String,
    /// Name shown in notifications.
    pub display_name: String,
    /// Authorization role.
    pub role: Role,
}

/// A production role binding for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    /// Unique worker ID.
    pub id: WorkerId,
    /// The user this binding belongs to.
    pub user_id: UserId,
    /// Production stage this worker handles.
    pub worker_type: WorkerType,
    /// Only active workers are picked up by stage chaining.
    pub active: bool,
}

/// Input for binding a user to a production role.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct NewWorker {
    /// The user to bind.
    pub user_id: UserId,
    /// Production stage this worker handles.
    pub worker_type: WorkerType,
}
