//! A finish whose stage chaining fails, against `PostgreSQL`.
//!
//! Requires `ECOPROM_TEST_DATABASE_URL`; every test returns early without it.
//! The test briefly uses up the current year's order numbers, so it lives in
//! a binary of its own where no other test is creating orders.

#![allow(clippy::unwrap_used)]

use eco_prom_core::{EvidenceSlot, OrderStatus, Role, WorkerType};
use eco_prom_integration_tests::{
    create_actor, create_worker, quiet_notifier, started_order, test_pool,
};
use eco_prom_production::db::OrderRepository;
use eco_prom_production::services::{OrderService, TransitionAction};
use sqlx::PgPool;

async fn set_counter(pool: &PgPool, year: i32, value: i32) {
    sqlx::query("UPDATE order_number_sequence SET last_value = $2 WHERE year = $1")
        .bind(year)
        .bind(value)
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_finish_commits_when_chaining_fails() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let service = OrderService::new(pool.clone(), quiet_notifier(pool.clone()));
    let manager = create_actor(&pool, Role::Manager).await;
    let (list_user, list_worker) = create_worker(&pool, WorkerType::List).await;

    let order = started_order(&service, manager, list_user, list_worker.id, WorkerType::List).await;
    service
        .attach_evidence(order.id, EvidenceSlot::Finish, "photos/finish.jpg", list_user)
        .await
        .unwrap();

    let year = order.order_number.year();
    let last: i32 =
        sqlx::query_scalar("SELECT last_value FROM order_number_sequence WHERE year = $1")
            .bind(year)
            .fetch_one(&pool)
            .await
            .unwrap();
    set_counter(&pool, year, 9999).await;
    let result = service
        .transition(order.id, TransitionAction::WorkerFinish, list_user, None)
        .await;
    set_counter(&pool, year, last).await;

    let outcome = result.unwrap();
    assert_eq!(outcome.order.status, OrderStatus::UstaTugatdi);
    assert!(outcome.successor.is_none());
    let failure = outcome.chaining_failure.expect("chaining failure reported");
    assert_eq!(failure.parent, order.id);
    assert!(failure.reason.contains("10000"), "{}", failure.reason);

    let stored = service.get(order.id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::UstaTugatdi);
    assert!(stored.worker_finished_at.is_some());
    assert!(OrderRepository::new(&pool).children(order.id).await.unwrap().is_empty());
    let events = service.events(order.id).await.unwrap();
    assert_eq!(events.last().unwrap().action, "worker_finish");
}
