//! Order status transitions.
//!
//! [`plan`] is pure: it decides whether an action is legal for an order and
//! what the transition writes, without touching storage. The order service
//! applies the plan under the order's row lock.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use eco_prom_core::{EvidenceSlot, OrderStatus, ParseEnumError};

use crate::error::OrderError;
use crate::models::Order;
use crate::services::authz::Action;
use crate::services::validation::validate_work_interval;

/// A requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionAction {
    /// Manager accepts a freshly entered order.
    Approve,
    /// Manager turns the order down. Terminal.
    Reject,
    /// Assigned worker takes the job, with start evidence attached.
    WorkerAccept,
    /// Assigned worker begins work.
    WorkerStart,
    /// Assigned worker finishes, with finish evidence attached.
    WorkerFinish,
    /// Production lead puts the order in work without a worker hand-off.
    StartProduction,
    /// Work is done and the product is ready for pickup.
    MarkReady,
    /// Customer has received the product. Terminal.
    Complete,
}

impl TransitionAction {
    pub const ALL: &'static [Self] = &[
        Self::Approve,
        Self::Reject,
        Self::WorkerAccept,
        Self::WorkerStart,
        Self::WorkerFinish,
        Self::StartProduction,
        Self::MarkReady,
        Self::Complete,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::WorkerAccept => "worker_accept",
            Self::WorkerStart => "worker_start",
            Self::WorkerFinish => "worker_finish",
            Self::StartProduction => "start_production",
            Self::MarkReady => "mark_ready",
            Self::Complete => "complete",
        }
    }

    /// The permission this action is checked against.
    #[must_use]
    pub const fn permission(&self) -> Action {
        match self {
            Self::Approve => Action::Approve,
            Self::Reject => Action::Reject,
            Self::WorkerAccept => Action::WorkerAccept,
            Self::WorkerStart => Action::WorkerStart,
            Self::WorkerFinish => Action::WorkerFinish,
            Self::StartProduction => Action::StartProduction,
            Self::MarkReady => Action::MarkReady,
            Self::Complete => Action::Complete,
        }
    }

    /// Target status when the action is legal from `from`.
    #[must_use]
    pub const fn target(&self, from: OrderStatus) -> Option<OrderStatus> {
        use OrderStatus as S;

        match (self, from) {
            (Self::Approve, S::Kiritildi) => Some(S::Tasdiqlandi),
            (Self::Reject, S::Kiritildi) => Some(S::RadEtildi),
            (Self::WorkerAccept, S::Tasdiqlandi) => Some(S::UstaQabulQildi),
            (Self::WorkerStart, S::UstaQabulQildi) => Some(S::UstaBoshla),
            (Self::WorkerFinish, S::UstaBoshla | S::Ishda) => Some(S::UstaTugatdi),
            (Self::StartProduction, S::Tasdiqlandi) => Some(S::Ishda),
            (Self::MarkReady, S::Ishda | S::UstaTugatdi) => Some(S::Tayyor),
            (Self::Complete, S::Tayyor) => Some(S::Bajarildi),
            _ => None,
        }
    }

    /// Whether the action may carry a worker comment.
    #[must_use]
    pub const fn takes_worker_comment(&self) -> bool {
        matches!(self, Self::WorkerStart | Self::WorkerFinish)
    }

    /// Evidence slot that must be filled before the action.
    #[must_use]
    pub const fn required_evidence(&self) -> Option<EvidenceSlot> {
        match self {
            Self::WorkerAccept => Some(EvidenceSlot::Start),
            Self::WorkerFinish => Some(EvidenceSlot::Finish),
            _ => None,
        }
    }

    /// Who hears about a committed transition.
    #[must_use]
    pub const fn audience(&self) -> &'static [Audience] {
        use Audience as A;

        match self {
            Self::Approve => &[A::Creator, A::ProductionLeads, A::AssignedWorkers],
            Self::Reject => &[A::Creator, A::AssignedWorkers],
            Self::WorkerAccept | Self::WorkerStart => &[A::Creator, A::ProductionLeads],
            Self::WorkerFinish => &[A::Creator, A::ProductionLeads, A::Managers],
            Self::StartProduction => &[A::Creator, A::AssignedWorkers],
            Self::MarkReady => &[A::Creator, A::Managers],
            Self::Complete => &[A::Creator, A::AssignedWorkers],
        }
    }
}

impl fmt::Display for TransitionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "transition action",
                value: s.to_owned(),
            })
    }
}

/// A group of notification recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Audience {
    /// The user who created the order.
    Creator,
    /// Workers assigned to the order.
    AssignedWorkers,
    /// Every active production lead.
    ProductionLeads,
    /// Every active manager.
    Managers,
    /// Every active admin.
    Admins,
}

/// What a legal transition writes and triggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub action: TransitionAction,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub worker_started_at: Option<DateTime<Utc>>,
    pub worker_finished_at: Option<DateTime<Utc>>,
    /// The worker finished after the deadline.
    pub deadline_breached: bool,
    /// Stage chaining runs after this transition.
    pub chain: bool,
    pub audience: &'static [Audience],
}

/// Decide whether `action` may be applied to `order` at `now`.
///
/// # Errors
///
/// - `OrderError::InvalidTransition` if the action is not legal from the
///   current status (always the case for terminal statuses)
/// - `OrderError::MissingEvidence` if the required photo is absent
/// - `OrderError::Validation` if the finish time precedes the start time
pub fn plan(
    order: &Order,
    action: TransitionAction,
    now: DateTime<Utc>,
) -> Result<TransitionPlan, OrderError> {
    let from = order.status;
    let to = action
        .target(from)
        .ok_or(OrderError::InvalidTransition { from, action })?;

    if let Some(slot) = action.required_evidence()
        && order.evidence(slot).is_none()
    {
        return Err(OrderError::MissingEvidence { slot });
    }

    let mut plan = TransitionPlan {
        action,
        from,
        to,
        worker_started_at: None,
        worker_finished_at: None,
        deadline_breached: false,
        chain: false,
        audience: action.audience(),
    };

    match action {
        TransitionAction::WorkerStart => plan.worker_started_at = Some(now),
        TransitionAction::WorkerFinish => {
            validate_work_interval(order.worker_started_at, now)?;
            plan.worker_finished_at = Some(now);
            plan.deadline_breached = order.is_past_deadline(now);
            plan.chain = true;
        }
        _ => {}
    }

    Ok(plan)
}
