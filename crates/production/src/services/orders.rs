//! Order service: creation, edits, status transitions and evidence.
//!
//! Every mutation locks the order row, applies its change together with an
//! audit row in one transaction, and only then notifies. Notification
//! failures never undo a committed change.

use chrono::{DateTime, Datelike, Utc};
use sqlx::{Acquire, PgConnection, PgPool};
use tracing::{info, instrument, warn};

use eco_prom_core::{EvidenceSlot, OrderId, OrderStatus, UserId, WorkerId};

use crate::db::orders::{self, OrderInsert, TransitionUpdate};
use crate::db::{OrderRepository, RepositoryError};
use crate::error::OrderError;
use crate::models::{Order, OrderEvent, OrderFilter, OrderSpec, Worker};
use crate::services::authz::{Action, Actor};
use crate::services::chaining::{self, ChainOutcome, ChainingFailure};
use crate::services::notifier::{
    Notifier, assignment_notice, deadline_breach_notice, status_notice,
};
use crate::services::state_machine::{self, Audience, TransitionAction};
use crate::services::validation::{ValidationErrors, ValidationMode, validate_order};
use crate::telegram::{
    build_deadline_breach_message, build_new_order_message, build_worker_finished_message,
};

/// Audit action recorded when an order is entered.
pub const CREATE_EVENT: &str = "create";
/// Audit action recorded when an order's spec is edited.
pub const UPDATE_EVENT: &str = "update";

/// Result of a committed transition.
#[derive(Debug)]
pub struct TransitionOutcome {
    /// The order after the transition.
    pub order: Order,
    pub from: OrderStatus,
    /// Successor created by stage chaining, if any.
    pub successor: Option<Order>,
    /// Chaining failed; the transition itself still committed.
    pub chaining_failure: Option<ChainingFailure>,
    /// This call raised the late-finish alert.
    pub deadline_breach_alerted: bool,
}

/// Service for order operations.
#[derive(Debug, Clone)]
pub struct OrderService {
    pool: PgPool,
    notifier: Notifier,
}

fn authorize(actor: &Actor, action: Action) -> Result<(), OrderError> {
    if actor.can(action) {
        Ok(())
    } else {
        Err(OrderError::Forbidden {
            role: actor.role,
            action,
        })
    }
}

fn ensure_assigned(actor: &Actor, action: Action, assigned: &[Worker]) -> Result<(), OrderError> {
    if actor.needs_assignment(action) && !assigned.iter().any(|w| w.user_id == actor.user_id) {
        return Err(OrderError::Forbidden {
            role: actor.role,
            action,
        });
    }
    Ok(())
}

/// A new deadline that lies in the future re-arms the deadline alerts.
fn deadline_extended(
    current: Option<DateTime<Utc>>,
    new: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    new != current && new.is_some_and(|deadline| deadline > now)
}

async fn lock_open_order(conn: &mut PgConnection, id: OrderId) -> Result<Order, OrderError> {
    let order = orders::lock_order(conn, id)
        .await?
        .ok_or(OrderError::NotFound)?;
    if order.status.is_terminal() {
        return Err(OrderError::Closed {
            status: order.status,
        });
    }
    Ok(order)
}

impl OrderService {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: PgPool, notifier: Notifier) -> Self {
        Self { pool, notifier }
    }

    /// Get an order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist.
    pub async fn get(&self, id: OrderId) -> Result<Order, OrderError> {
        OrderRepository::new(&self.pool)
            .get(id)
            .await?
            .ok_or(OrderError::NotFound)
    }

    /// List orders.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, OrderError> {
        Ok(OrderRepository::new(&self.pool).list(filter).await?)
    }

    /// Audit trail of an order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn events(&self, id: OrderId) -> Result<Vec<OrderEvent>, OrderError> {
        Ok(OrderRepository::new(&self.pool).events(id).await?)
    }

    /// Enter a new order in `KIRITILDI`.
    ///
    /// # Errors
    ///
    /// - `OrderError::Forbidden` if the actor may not create orders
    /// - `OrderError::Validation` with every failing field
    #[instrument(skip(self, spec), fields(worker_type = %spec.worker_type, user_id = %actor.user_id))]
    pub async fn create_order(&self, spec: &OrderSpec, actor: Actor) -> Result<Order, OrderError> {
        authorize(&actor, Action::CreateOrder)?;
        let now = Utc::now();
        validate_order(spec, ValidationMode::Create { now })?;

        let mut tx = self.pool.begin().await?;
        let order_number = orders::next_order_number(&mut tx, now.year()).await?;
        let order = orders::insert_order(
            &mut tx,
            &OrderInsert {
                order_number,
                status: OrderStatus::Kiritildi,
                spec,
                parent_order_id: None,
                created_by: actor.user_id,
            },
        )
        .await?;
        orders::insert_event(&mut tx, order.id, CREATE_EVENT, None, order.status, actor.user_id)
            .await?;
        tx.commit().await?;

        info!(order_id = %order.id, order_number = %order.order_number, "Order created");

        self.notifier
            .notify_audience(
                &order,
                &[Audience::Managers, Audience::Admins],
                &[],
                Some(actor.user_id),
                &status_notice(&order),
            )
            .await;
        self.notifier
            .post_to_channel(&build_new_order_message(&order))
            .await;

        Ok(order)
    }

    /// Replace an open order's spec.
    ///
    /// # Errors
    ///
    /// - `OrderError::Forbidden` if the actor may not edit orders
    /// - `OrderError::Validation` with every failing field
    /// - `OrderError::NotFound` / `OrderError::Closed`
    #[instrument(skip(self, spec), fields(order_id = %id, user_id = %actor.user_id))]
    pub async fn update_order(
        &self,
        id: OrderId,
        spec: &OrderSpec,
        actor: Actor,
    ) -> Result<Order, OrderError> {
        authorize(&actor, Action::UpdateOrder)?;
        validate_order(spec, ValidationMode::Update)?;

        let mut tx = self.pool.begin().await?;
        let current = lock_open_order(&mut tx, id).await?;
        let rearm = deadline_extended(current.deadline, spec.deadline, Utc::now());
        if rearm {
            orders::rearm_deadline_alerts(&mut tx, id).await?;
        }
        let order = orders::update_spec(&mut tx, id, spec).await?;
        orders::insert_event(
            &mut tx,
            id,
            UPDATE_EVENT,
            Some(current.status),
            order.status,
            actor.user_id,
        )
        .await?;
        tx.commit().await?;

        info!(order_number = %order.order_number, rearm, "Order updated");
        Ok(order)
    }

    /// Assign workers to an open order and notify the newly assigned ones.
    ///
    /// # Errors
    ///
    /// - `OrderError::Forbidden` if the actor may not edit orders
    /// - `OrderError::NotFound` / `OrderError::Closed`
    /// - `OrderError::Repository` with a conflict for unknown workers
    #[instrument(skip(self, workers), fields(order_id = %id, user_id = %actor.user_id))]
    pub async fn assign_workers(
        &self,
        id: OrderId,
        workers: &[WorkerId],
        actor: Actor,
    ) -> Result<Vec<Worker>, OrderError> {
        authorize(&actor, Action::UpdateOrder)?;

        let mut tx = self.pool.begin().await?;
        let order = lock_open_order(&mut tx, id).await?;
        let newly = orders::assign_workers(&mut tx, id, workers).await?;
        let assigned: Vec<Worker> = orders::assigned_workers(&mut tx, id)
            .await?
            .into_iter()
            .filter(|w| newly.contains(&w.id))
            .collect();
        tx.commit().await?;

        info!(assigned = assigned.len(), "Workers assigned");

        let recipients: Vec<UserId> = assigned.iter().map(|w| w.user_id).collect();
        self.notifier
            .notify_users(&recipients, Some(order.id), &assignment_notice(&order))
            .await;

        Ok(assigned)
    }

    /// Store an evidence image reference on an open order.
    ///
    /// # Errors
    ///
    /// - `OrderError::Forbidden` if the actor may not attach evidence here
    /// - `OrderError::Validation` if the reference is blank
    /// - `OrderError::NotFound` / `OrderError::Closed`
    #[instrument(skip(self, reference), fields(order_id = %id, slot = %slot, user_id = %actor.user_id))]
    pub async fn attach_evidence(
        &self,
        id: OrderId,
        slot: EvidenceSlot,
        reference: &str,
        actor: Actor,
    ) -> Result<Order, OrderError> {
        authorize(&actor, Action::AttachEvidence)?;
        let reference = reference.trim();
        if reference.is_empty() {
            let mut errors = ValidationErrors::default();
            errors.add("evidence", "is required");
            return Err(errors.into());
        }

        let mut tx = self.pool.begin().await?;
        let current = lock_open_order(&mut tx, id).await?;
        let assigned = orders::assigned_workers(&mut tx, id).await?;
        ensure_assigned(&actor, Action::AttachEvidence, &assigned)?;

        let order = orders::set_evidence(&mut tx, id, slot, reference, Utc::now()).await?;
        orders::insert_event(
            &mut tx,
            id,
            &format!("attach_{slot}_evidence"),
            Some(current.status),
            order.status,
            actor.user_id,
        )
        .await?;
        tx.commit().await?;

        info!("Evidence attached");
        Ok(order)
    }

    /// Apply a status transition.
    ///
    /// A worker finish also runs stage chaining inside a savepoint. If
    /// chaining fails the finish still commits and the failure is returned
    /// in [`TransitionOutcome::chaining_failure`].
    ///
    /// # Errors
    ///
    /// - `OrderError::Forbidden` if the role or assignment does not allow it
    /// - `OrderError::NotFound` if the order does not exist
    /// - `OrderError::InvalidTransition` / `OrderError::MissingEvidence`
    #[instrument(skip(self, worker_comment), fields(order_id = %id, action = %action, user_id = %actor.user_id))]
    pub async fn transition(
        &self,
        id: OrderId,
        action: TransitionAction,
        actor: Actor,
        worker_comment: Option<&str>,
    ) -> Result<TransitionOutcome, OrderError> {
        let permission = action.permission();
        authorize(&actor, permission)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let order = orders::lock_order(&mut tx, id)
            .await?
            .ok_or(OrderError::NotFound)?;
        let assigned = orders::assigned_workers(&mut tx, id).await?;
        ensure_assigned(&actor, permission, &assigned)?;

        let plan = state_machine::plan(&order, action, now)?;
        let updated = orders::apply_transition(
            &mut tx,
            id,
            &TransitionUpdate {
                status: Some(plan.to),
                worker_started_at: plan.worker_started_at,
                worker_finished_at: plan.worker_finished_at,
                worker_comment: worker_comment
                    .filter(|_| action.takes_worker_comment())
                    .map(str::trim)
                    .filter(|c| !c.is_empty()),
            },
        )
        .await?;
        orders::insert_event(&mut tx, id, action.as_str(), Some(plan.from), plan.to, actor.user_id)
            .await?;

        let deadline_breach_alerted = if plan.deadline_breached {
            orders::claim_deadline_breach_alert(&mut *tx, id).await?
        } else {
            false
        };

        let mut chain_outcome = None;
        let mut chaining_failure = None;
        if plan.chain {
            match chain_in_savepoint(&mut tx, &updated, actor.user_id, now).await {
                Ok(outcome) => chain_outcome = Some(outcome),
                Err(e) => {
                    warn!(error = %e, "Stage chaining failed, finish still commits");
                    chaining_failure = Some(ChainingFailure {
                        parent: id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tx.commit().await?;

        info!(
            order_number = %updated.order_number,
            from = %plan.from,
            to = %plan.to,
            "Order transitioned"
        );

        self.notifier
            .notify_audience(
                &updated,
                plan.audience,
                &assigned,
                Some(actor.user_id),
                &status_notice(&updated),
            )
            .await;

        if action == TransitionAction::WorkerFinish {
            let worker_name = self.notifier.display_name(actor.user_id).await;
            self.notifier
                .post_to_channel(&build_worker_finished_message(&updated, &worker_name))
                .await;
        }

        if deadline_breach_alerted {
            warn!(order_number = %updated.order_number, "Order finished after its deadline");
            self.notifier
                .notify_audience(
                    &updated,
                    &[Audience::Admins, Audience::ProductionLeads],
                    &[],
                    None,
                    &deadline_breach_notice(&updated),
                )
                .await;
            self.notifier
                .post_to_channel(&build_deadline_breach_message(&updated))
                .await;
        }

        let successor = match chain_outcome {
            Some(ChainOutcome::Created {
                successor,
                assigned,
            }) => {
                let recipients: Vec<UserId> = assigned.iter().map(|w| w.user_id).collect();
                self.notifier
                    .notify_users(&recipients, Some(successor.id), &assignment_notice(&successor))
                    .await;
                Some(*successor)
            }
            _ => None,
        };

        Ok(TransitionOutcome {
            order: updated,
            from: plan.from,
            successor,
            chaining_failure,
            deadline_breach_alerted,
        })
    }
}

/// Run stage chaining in a savepoint so a failure only rolls back the
/// successor.
async fn chain_in_savepoint(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    parent: &Order,
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<ChainOutcome, RepositoryError> {
    let mut savepoint = Acquire::begin(&mut *tx).await?;
    match chaining::chain_successor(&mut savepoint, parent, actor, now).await {
        Ok(outcome) => {
            savepoint.commit().await?;
            Ok(outcome)
        }
        Err(e) => {
            savepoint.rollback().await?;
            Err(e)
        }
    }
}
