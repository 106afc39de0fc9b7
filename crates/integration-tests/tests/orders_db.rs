//! Order service against `PostgreSQL`.
//!
//! Requires `ECOPROM_TEST_DATABASE_URL`; every test returns early without it.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;

use chrono::{Datelike, Utc};
use eco_prom_core::{EvidenceSlot, OrderStatus, Role, WorkerType};
use eco_prom_integration_tests::{
    create_actor, create_worker, order_spec, quiet_notifier, started_order, test_pool,
};
use eco_prom_production::OrderError;
use eco_prom_production::db::{NotificationRepository, OrderRepository};
use eco_prom_production::models::OrderFilter;
use eco_prom_production::services::{OrderService, TransitionAction};

#[tokio::test]
async fn test_create_writes_audit_row_and_number() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let service = OrderService::new(pool.clone(), quiet_notifier(pool.clone()));
    let manager = create_actor(&pool, Role::Manager).await;

    let order = service
        .create_order(&order_spec(WorkerType::List, None), manager)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Kiritildi);
    assert_eq!(order.order_number.year(), Utc::now().year());

    let events = service.events(order.id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, "create");
    assert_eq!(events[0].from_status, None);
    assert_eq!(events[0].actor_id, manager.user_id);
}

#[tokio::test]
async fn test_concurrent_creates_get_distinct_increasing_numbers() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let service = OrderService::new(pool.clone(), quiet_notifier(pool.clone()));
    let manager = create_actor(&pool, Role::Manager).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .create_order(&order_spec(WorkerType::Panel, None), manager)
                    .await
            })
        })
        .collect();

    let mut orders = Vec::new();
    for handle in handles {
        orders.push(handle.await.unwrap().unwrap());
    }

    let numbers: HashSet<_> = orders.iter().map(|o| o.order_number).collect();
    assert_eq!(numbers.len(), orders.len(), "order numbers must be unique");

    // Numbers follow commit order of the counter row, as do ids.
    orders.sort_by_key(|o| o.id.as_i32());
    for pair in orders.windows(2) {
        assert!(pair[0].order_number < pair[1].order_number);
    }
}

#[tokio::test]
async fn test_unassigned_worker_is_forbidden() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let service = OrderService::new(pool.clone(), quiet_notifier(pool.clone()));
    let manager = create_actor(&pool, Role::Manager).await;
    let (outsider, _) = create_worker(&pool, WorkerType::List).await;

    let order = service
        .create_order(&order_spec(WorkerType::List, None), manager)
        .await
        .unwrap();
    service
        .transition(order.id, TransitionAction::Approve, manager, None)
        .await
        .unwrap();

    let err = service
        .attach_evidence(order.id, EvidenceSlot::Start, "photos/x.jpg", outsider)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Forbidden { .. }));
}

#[tokio::test]
async fn test_list_finish_chains_exactly_one_panel_order() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let service = OrderService::new(pool.clone(), quiet_notifier(pool.clone()));
    let manager = create_actor(&pool, Role::Manager).await;
    let (list_user, list_worker) = create_worker(&pool, WorkerType::List).await;
    let (panel_user, panel_worker) = create_worker(&pool, WorkerType::Panel).await;

    let order = started_order(&service, manager, list_user, list_worker.id, WorkerType::List).await;
    service
        .attach_evidence(order.id, EvidenceSlot::Finish, "photos/finish.jpg", list_user)
        .await
        .unwrap();

    // Two finishes race; only one can win the row lock from USTA_BOSHLA.
    let (first, second) = tokio::join!(
        service.transition(order.id, TransitionAction::WorkerFinish, list_user, Some("Tayyor")),
        service.transition(order.id, TransitionAction::WorkerFinish, list_user, None),
    );
    let outcome = match (first, second) {
        (Ok(outcome), Err(OrderError::InvalidTransition { .. }))
        | (Err(OrderError::InvalidTransition { .. }), Ok(outcome)) => outcome,
        other => panic!("exactly one finish should succeed, got {other:?}"),
    };

    assert_eq!(outcome.order.status, OrderStatus::UstaTugatdi);
    assert!(outcome.chaining_failure.is_none());
    let successor = outcome.successor.expect("a PANEL successor");
    assert_eq!(successor.worker_type, WorkerType::Panel);
    assert_eq!(successor.status, OrderStatus::Tasdiqlandi);
    assert_eq!(successor.parent_order_id, Some(order.id));
    assert_eq!(successor.customer_name, order.customer_name);
    assert_eq!(successor.total_price, eco_prom_core::Money::ZERO);

    let repo = OrderRepository::new(&pool);
    assert_eq!(repo.children(order.id).await.unwrap().len(), 1);

    let assigned = repo.assigned_workers(successor.id).await.unwrap();
    assert!(assigned.iter().any(|w| w.id == panel_worker.id));
    assert!(assigned.iter().all(|w| w.worker_type == WorkerType::Panel && w.active));

    let events = service.events(successor.id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, "chain");
    assert_eq!(events[0].actor_id, list_user.user_id);

    // The new PANEL worker hears about the successor.
    let inbox = NotificationRepository::new(&pool);
    let unread = inbox.unread(panel_user.user_id).await.unwrap();
    let notice = unread
        .iter()
        .find(|n| n.order_id == Some(successor.id))
        .expect("assignment notification");
    assert!(notice.message.contains(&successor.order_number.to_string()));
    inbox.mark_read(panel_user.user_id, notice.id).await.unwrap();
    assert!(
        inbox
            .unread(panel_user.user_id)
            .await
            .unwrap()
            .iter()
            .all(|n| n.id != notice.id)
    );
}

#[tokio::test]
async fn test_late_finish_raises_breach_alert() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let service = OrderService::new(pool.clone(), quiet_notifier(pool.clone()));
    let manager = create_actor(&pool, Role::Manager).await;
    let (ugol_user, ugol_worker) = create_worker(&pool, WorkerType::Ugol).await;

    let order = started_order(&service, manager, ugol_user, ugol_worker.id, WorkerType::Ugol).await;
    sqlx::query("UPDATE production_order SET deadline = NOW() - INTERVAL '1 hour' WHERE id = $1")
        .bind(order.id)
        .execute(&pool)
        .await
        .unwrap();
    service
        .attach_evidence(order.id, EvidenceSlot::Finish, "photos/finish.jpg", ugol_user)
        .await
        .unwrap();

    let outcome = service
        .transition(order.id, TransitionAction::WorkerFinish, ugol_user, None)
        .await
        .unwrap();
    assert!(outcome.deadline_breach_alerted);
    // UGOL is the last stage.
    assert!(outcome.successor.is_none());

    let stored = service.get(order.id).await.unwrap();
    assert!(stored.deadline_breach_alert_sent);
}

#[tokio::test]
async fn test_closed_order_cannot_be_edited() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let service = OrderService::new(pool.clone(), quiet_notifier(pool.clone()));
    let manager = create_actor(&pool, Role::Manager).await;

    let order = service
        .create_order(&order_spec(WorkerType::Eshik, None), manager)
        .await;
    // ESHIK requires a door spec.
    assert!(matches!(order, Err(OrderError::Validation(ref e)) if e.has("door_type")));

    let order = service
        .create_order(&order_spec(WorkerType::List, None), manager)
        .await
        .unwrap();
    service
        .transition(order.id, TransitionAction::Reject, manager, None)
        .await
        .unwrap();

    let err = service
        .update_order(order.id, &order_spec(WorkerType::List, None), manager)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::Closed {
            status: OrderStatus::RadEtildi
        }
    ));
}

#[tokio::test]
async fn test_worker_comment_only_from_worker_actions() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let service = OrderService::new(pool.clone(), quiet_notifier(pool.clone()));
    let manager = create_actor(&pool, Role::Manager).await;
    let (ugol_user, ugol_worker) = create_worker(&pool, WorkerType::Ugol).await;

    let order = service
        .create_order(&order_spec(WorkerType::Ugol, None), manager)
        .await
        .unwrap();
    let approved = service
        .transition(order.id, TransitionAction::Approve, manager, Some("Tezroq"))
        .await
        .unwrap();
    assert_eq!(approved.order.worker_comment, None);

    service
        .assign_workers(order.id, &[ugol_worker.id], manager)
        .await
        .unwrap();
    service
        .attach_evidence(order.id, EvidenceSlot::Start, "photos/start.jpg", ugol_user)
        .await
        .unwrap();
    service
        .transition(order.id, TransitionAction::WorkerAccept, ugol_user, Some("Qabul"))
        .await
        .unwrap();
    let started = service
        .transition(order.id, TransitionAction::WorkerStart, ugol_user, Some("  Boshladim "))
        .await
        .unwrap();
    assert_eq!(started.order.worker_comment.as_deref(), Some("Boshladim"));
}

#[tokio::test]
async fn test_list_filters_by_assigned_user() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let service = OrderService::new(pool.clone(), quiet_notifier(pool.clone()));
    let manager = create_actor(&pool, Role::Manager).await;
    let (worker_user, worker) = create_worker(&pool, WorkerType::List).await;

    let mine = service
        .create_order(&order_spec(WorkerType::List, None), manager)
        .await
        .unwrap();
    let other = service
        .create_order(&order_spec(WorkerType::List, None), manager)
        .await
        .unwrap();
    service
        .assign_workers(mine.id, &[worker.id], manager)
        .await
        .unwrap();

    let listed = service
        .list(&OrderFilter {
            assigned_user: Some(worker_user.user_id),
            ..OrderFilter::default()
        })
        .await
        .unwrap();
    let ids: Vec<_> = listed.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![mine.id]);
    assert!(!ids.contains(&other.id));
}

