//! Order commands.
//!
//! # Usage
//!
//! ```bash
//! # Create from a JSON order spec
//! ecoprom --as menejer order create -f order.json
//!
//! ecoprom order list --status ISHDA
//! ecoprom --as usta1 order list --mine
//! ecoprom order show ORD-2026-0007
//! ecoprom --as menejer order assign ORD-2026-0007 -w 3 -w 4
//! ecoprom --as usta1 order evidence ORD-2026-0007 start photos/ORD-2026-0007-start.jpg
//! ecoprom --as usta1 order transition ORD-2026-0007 worker_finish -c "Tayyor"
//! ```

use eco_prom_core::{EvidenceSlot, OrderNumber, OrderStatus, WorkerId, WorkerType};
use eco_prom_production::db::OrderRepository;
use eco_prom_production::models::{Order, OrderFilter, OrderSpec};
use eco_prom_production::services::{LedgerService, OrderService, TransitionAction};
use serde_json::json;

use super::{CommandError, Context, print_json};

fn service(ctx: &Context) -> OrderService {
    OrderService::new(ctx.pool.clone(), ctx.notifier.clone())
}

async fn find(ctx: &Context, number: &OrderNumber) -> Result<Order, CommandError> {
    OrderRepository::new(&ctx.pool)
        .get_by_number(number)
        .await?
        .ok_or_else(|| CommandError::UnknownOrder(number.to_string()))
}

/// Create an order from a JSON spec file.
pub async fn create(ctx: &Context, path: &str) -> Result<(), CommandError> {
    let actor = ctx.actor().await?;
    let raw = tokio::fs::read_to_string(path).await?;
    let spec: OrderSpec = serde_json::from_str(&raw)?;

    let order = service(ctx).create_order(&spec, actor).await?;
    tracing::info!(
        "Order created! Number: {}, Customer: {}, Stage: {}",
        order.order_number,
        order.customer_name,
        order.worker_type
    );
    Ok(())
}

/// List orders as JSON. `mine` keeps only orders assigned to the actor.
pub async fn list(
    ctx: &Context,
    status: Option<OrderStatus>,
    worker_type: Option<WorkerType>,
    mine: bool,
    limit: i64,
) -> Result<(), CommandError> {
    let assigned_user = if mine {
        Some(ctx.actor().await?.user_id)
    } else {
        None
    };
    let filter = OrderFilter {
        status,
        worker_type,
        assigned_user,
        limit: Some(limit.max(1)),
        ..OrderFilter::default()
    };
    let orders = service(ctx).list(&filter).await?;
    print_json(&orders)
}

/// Show an order with its assignments, stock movements and audit trail.
pub async fn show(ctx: &Context, number: &OrderNumber) -> Result<(), CommandError> {
    let order = find(ctx, number).await?;
    let repo = OrderRepository::new(&ctx.pool);
    let workers = repo.assigned_workers(order.id).await?;
    let children = repo.children(order.id).await?;
    let events = service(ctx).events(order.id).await?;
    let movements = LedgerService::new(ctx.pool.clone())
        .order_transactions(order.id)
        .await?;

    print_json(&json!({
        "remaining_amount": order.remaining_amount(),
        "order": order,
        "assigned_workers": workers,
        "successors": children.iter().map(|c| c.order_number.to_string()).collect::<Vec<_>>(),
        "stock_movements": movements,
        "events": events,
    }))
}

/// Assign workers to an order.
pub async fn assign(
    ctx: &Context,
    number: &OrderNumber,
    workers: &[i32],
) -> Result<(), CommandError> {
    let actor = ctx.actor().await?;
    let order = find(ctx, number).await?;
    let ids: Vec<WorkerId> = workers.iter().copied().map(WorkerId::new).collect();

    let assigned = service(ctx).assign_workers(order.id, &ids, actor).await?;
    if assigned.is_empty() {
        tracing::info!("All given workers were already assigned to {}", number);
    } else {
        tracing::info!("{} worker(s) newly assigned to {}", assigned.len(), number);
    }
    Ok(())
}

/// Attach an evidence image reference.
pub async fn attach_evidence(
    ctx: &Context,
    number: &OrderNumber,
    slot: EvidenceSlot,
    reference: &str,
) -> Result<(), CommandError> {
    let actor = ctx.actor().await?;
    let order = find(ctx, number).await?;
    service(ctx)
        .attach_evidence(order.id, slot, reference, actor)
        .await?;
    tracing::info!("{} evidence attached to {}", slot, number);
    Ok(())
}

/// Apply a status transition.
pub async fn transition(
    ctx: &Context,
    number: &OrderNumber,
    action: TransitionAction,
    comment: Option<&str>,
) -> Result<(), CommandError> {
    let actor = ctx.actor().await?;
    let order = find(ctx, number).await?;
    let outcome = service(ctx)
        .transition(order.id, action, actor, comment)
        .await?;

    tracing::info!(
        "{}: {} -> {}",
        outcome.order.order_number,
        outcome.from,
        outcome.order.status
    );
    if let Some(successor) = &outcome.successor {
        tracing::info!(
            "Next stage created: {} ({})",
            successor.order_number,
            successor.worker_type
        );
    }
    if outcome.deadline_breach_alerted {
        tracing::warn!("{} finished after its deadline", outcome.order.order_number);
    }
    if let Some(failure) = &outcome.chaining_failure {
        tracing::error!("Next stage was not created: {}", failure.reason);
    }
    Ok(())
}
