//! Stage chaining against `PostgreSQL`.
//!
//! Requires `ECOPROM_TEST_DATABASE_URL`; every test returns early without it.
//! Only this binary creates `PANEL` workers while it runs, so the assigned
//! set can be compared with every active `PANEL` worker.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;

use chrono::Utc;
use eco_prom_core::{EvidenceSlot, Role, WorkerId, WorkerType};
use eco_prom_integration_tests::{
    create_actor, create_worker, order_spec, quiet_notifier, started_order, test_pool,
};
use eco_prom_production::db::{OrderRepository, UserRepository, users};
use eco_prom_production::services::chaining::{self, ChainOutcome};
use eco_prom_production::services::{OrderService, TransitionAction};

#[tokio::test]
async fn test_chaining_twice_keeps_one_successor() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let service = OrderService::new(pool.clone(), quiet_notifier(pool.clone()));
    let manager = create_actor(&pool, Role::Manager).await;
    let order = service
        .create_order(&order_spec(WorkerType::List, None), manager)
        .await
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    let first = chaining::chain_successor(&mut tx, &order, manager.user_id, Utc::now())
        .await
        .unwrap();
    tx.commit().await.unwrap();
    let ChainOutcome::Created { successor, .. } = first else {
        panic!("expected a new successor, got {first:?}");
    };
    assert_eq!(successor.worker_type, WorkerType::Panel);

    let mut tx = pool.begin().await.unwrap();
    let second = chaining::chain_successor(&mut tx, &order, manager.user_id, Utc::now())
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert!(matches!(
        second,
        ChainOutcome::AlreadyChained { successor: id } if id == successor.id
    ));

    let children = OrderRepository::new(&pool).children(order.id).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, successor.id);
}

#[tokio::test]
async fn test_last_stage_has_no_successor() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let service = OrderService::new(pool.clone(), quiet_notifier(pool.clone()));
    let manager = create_actor(&pool, Role::Manager).await;
    let order = service
        .create_order(&order_spec(WorkerType::Ugol, None), manager)
        .await
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    let outcome = chaining::chain_successor(&mut tx, &order, manager.user_id, Utc::now())
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert!(matches!(outcome, ChainOutcome::NoNextStage));
    assert!(OrderRepository::new(&pool).children(order.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_successor_goes_to_every_active_worker_of_next_stage() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let service = OrderService::new(pool.clone(), quiet_notifier(pool.clone()));
    let manager = create_actor(&pool, Role::Manager).await;
    let (list_user, list_worker) = create_worker(&pool, WorkerType::List).await;

    let (_, panel_a) = create_worker(&pool, WorkerType::Panel).await;
    let (_, panel_b) = create_worker(&pool, WorkerType::Panel).await;
    let (_, benched) = create_worker(&pool, WorkerType::Panel).await;
    UserRepository::new(&pool)
        .set_worker_active(benched.id, false)
        .await
        .unwrap();
    let (departed_user, departed) = create_worker(&pool, WorkerType::Panel).await;
    sqlx::query("UPDATE app_user SET active = FALSE WHERE id = $1")
        .bind(departed_user.user_id)
        .execute(&pool)
        .await
        .unwrap();

    let order = started_order(&service, manager, list_user, list_worker.id, WorkerType::List).await;
    service
        .attach_evidence(order.id, EvidenceSlot::Finish, "photos/finish.jpg", list_user)
        .await
        .unwrap();
    let outcome = service
        .transition(order.id, TransitionAction::WorkerFinish, list_user, None)
        .await
        .unwrap();
    let successor = outcome.successor.unwrap();

    let assigned: HashSet<WorkerId> = OrderRepository::new(&pool)
        .assigned_workers(successor.id)
        .await
        .unwrap()
        .into_iter()
        .map(|w| w.id)
        .collect();
    let mut conn = pool.acquire().await.unwrap();
    let active_panel: HashSet<WorkerId> = users::active_workers_of_type(&mut conn, WorkerType::Panel)
        .await
        .unwrap()
        .into_iter()
        .map(|w| w.id)
        .collect();

    assert_eq!(assigned, active_panel);
    assert!(assigned.contains(&panel_a.id));
    assert!(assigned.contains(&panel_b.id));
    assert!(!assigned.contains(&benched.id), "inactive worker assigned");
    assert!(!assigned.contains(&departed.id), "worker of inactive user assigned");
}
