//! Role-based authorization.
//!
//! One table decides which role may perform which action. Assignment checks
//! for workers are layered on top by the order service.

use std::fmt;

use serde::{Deserialize, Serialize};

use eco_prom_core::{Role, UserId};

/// The user performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    #[must_use]
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Whether this actor's role allows `action`.
    #[must_use]
    pub const fn can(&self, action: Action) -> bool {
        permits(self.role, action)
    }

    /// Whether `action` is only allowed on orders the actor is assigned to.
    #[must_use]
    pub const fn needs_assignment(&self, action: Action) -> bool {
        matches!(self.role, Role::Worker) && action.is_worker_action()
    }
}

/// Mutating operations subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateOrder,
    UpdateOrder,
    Approve,
    Reject,
    WorkerAccept,
    WorkerStart,
    WorkerFinish,
    StartProduction,
    MarkReady,
    Complete,
    AttachEvidence,
    RecordStock,
    ManageInventory,
}

impl Action {
    pub const ALL: &'static [Self] = &[
        Self::CreateOrder,
        Self::UpdateOrder,
        Self::Approve,
        Self::Reject,
        Self::WorkerAccept,
        Self::WorkerStart,
        Self::WorkerFinish,
        Self::StartProduction,
        Self::MarkReady,
        Self::Complete,
        Self::AttachEvidence,
        Self::RecordStock,
        Self::ManageInventory,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreateOrder => "create_order",
            Self::UpdateOrder => "update_order",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::WorkerAccept => "worker_accept",
            Self::WorkerStart => "worker_start",
            Self::WorkerFinish => "worker_finish",
            Self::StartProduction => "start_production",
            Self::MarkReady => "mark_ready",
            Self::Complete => "complete",
            Self::AttachEvidence => "attach_evidence",
            Self::RecordStock => "record_stock",
            Self::ManageInventory => "manage_inventory",
        }
    }

    /// Actions performed by the worker doing the job.
    #[must_use]
    pub const fn is_worker_action(&self) -> bool {
        matches!(
            self,
            Self::WorkerAccept | Self::WorkerStart | Self::WorkerFinish | Self::AttachEvidence
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The permission table.
#[must_use]
pub const fn permits(role: Role, action: Action) -> bool {
    match role {
        Role::Admin => true,
        Role::Manager => matches!(
            action,
            Action::CreateOrder
                | Action::UpdateOrder
                | Action::Approve
                | Action::Reject
                | Action::Complete
                | Action::RecordStock
                | Action::ManageInventory
        ),
        Role::ProductionLead => matches!(
            action,
            Action::CreateOrder
                | Action::StartProduction
                | Action::MarkReady
                | Action::RecordStock
        ),
        Role::Worker => action.is_worker_action(),
        Role::Observer => false,
    }
}
