//! Stage chaining: when a worker finishes a stage, the next stage's order is
//! created and handed to every active worker of that stage.

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use thiserror::Error;
use tracing::{debug, info};

use eco_prom_core::{OrderId, OrderStatus, UserId};

use crate::db::RepositoryError;
use crate::db::orders::{self, OrderInsert};
use crate::db::users;
use crate::models::{DoorSpec, NewChildOrder, Order, OrderSpec, Worker};

/// Audit action recorded on a chained order.
pub const CHAIN_EVENT: &str = "chain";

/// Result of running the chaining engine for a finished order.
#[derive(Debug)]
pub enum ChainOutcome {
    /// The order's stage is the last one.
    NoNextStage,
    /// A successor was created earlier.
    AlreadyChained { successor: OrderId },
    /// A successor was created now.
    Created {
        successor: Box<Order>,
        /// Workers newly assigned to the successor.
        assigned: Vec<Worker>,
    },
}

/// Chaining failed; the finish it belongs to still committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not chain a successor for order {parent}: {reason}")]
pub struct ChainingFailure {
    pub parent: OrderId,
    pub reason: String,
}

/// The successor a finished order should spawn, if its stage has one.
///
/// The child carries the parent's panel, area, drawing, customer, product
/// and deadline. Prices stay with the parent and door details do not apply
/// to later stages.
#[must_use]
pub fn derive_successor(parent: &Order) -> Option<NewChildOrder> {
    let worker_type = parent.worker_type.next_stage()?;

    Some(NewChildOrder {
        parent_order_id: parent.id,
        created_by: parent.created_by,
        spec: OrderSpec {
            customer_name: parent.customer_name.clone(),
            product_name: parent.product_name.clone(),
            worker_type,
            panel: parent.panel,
            door: DoorSpec::default(),
            area: parent.area,
            total_price: Decimal::ZERO,
            prepayment: Decimal::ZERO,
            deadline: parent.deadline,
            comment: None,
            drawing_reference: parent.drawing_reference.clone(),
        },
    })
}

/// Create the successor of `parent` inside the caller's transaction.
///
/// Idempotent: a parent that already has a successor is left alone. The
/// partial unique index on `parent_order_id` backs the check.
///
/// # Errors
///
/// Returns `RepositoryError` if any query fails. The caller is expected to
/// run this in a savepoint and roll it back on error.
pub async fn chain_successor(
    conn: &mut PgConnection,
    parent: &Order,
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<ChainOutcome, RepositoryError> {
    let Some(child) = derive_successor(parent) else {
        debug!(order_id = %parent.id, worker_type = %parent.worker_type, "No next stage");
        return Ok(ChainOutcome::NoNextStage);
    };

    if let Some(successor) = orders::successor_of(conn, parent.id).await? {
        debug!(order_id = %parent.id, successor = %successor, "Already chained");
        return Ok(ChainOutcome::AlreadyChained { successor });
    }

    let order_number = orders::next_order_number(conn, now.year()).await?;
    let successor = orders::insert_order(
        conn,
        &OrderInsert {
            order_number,
            status: OrderStatus::Tasdiqlandi,
            spec: &child.spec,
            parent_order_id: Some(child.parent_order_id),
            created_by: child.created_by,
        },
    )
    .await?;

    orders::insert_event(conn, successor.id, CHAIN_EVENT, None, successor.status, actor).await?;

    let candidates = users::active_workers_of_type(conn, child.spec.worker_type).await?;
    let ids: Vec<_> = candidates.iter().map(|w| w.id).collect();
    let newly_assigned = orders::assign_workers(conn, successor.id, &ids).await?;
    let assigned: Vec<Worker> = candidates
        .into_iter()
        .filter(|w| newly_assigned.contains(&w.id))
        .collect();

    info!(
        parent = %parent.id,
        successor = %successor.order_number,
        worker_type = %successor.worker_type,
        assigned = assigned.len(),
        "Chained successor order"
    );

    Ok(ChainOutcome::Created {
        successor: Box::new(successor),
        assigned,
    })
}
