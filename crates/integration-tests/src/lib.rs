//! Integration tests for Eco Prom.
//!
//! # Running Tests
//!
//! ```bash
//! # Logic tests only
//! cargo test -p eco-prom-integration-tests
//!
//! # Include the PostgreSQL-backed tests
//! ECOPROM_TEST_DATABASE_URL=postgres://localhost/ecoprom_test \
//!     cargo test -p eco-prom-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `pipeline` - Order state machine and chaining rules across crates
//! - `orders_db` - Order service against a real database
//! - `ledger_db` - Stock ledger concurrency and journal rules
//! - `deadlines_db` - One-shot deadline alerts and re-arming on extension
//! - `chaining_db` - Successor creation and auto-assignment
//! - `chaining_failure_db` - A finish that commits although chaining fails
//!
//! Database tests share one schema, so every fixture gets a unique name and
//! assertions only look at rows the test created itself.

#![allow(clippy::missing_panics_doc)]

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use eco_prom_core::{EvidenceSlot, Role, TransactionDirection, WorkerId, WorkerType};
use eco_prom_production::db::{self, UserRepository};
use eco_prom_production::models::{
    DoorSpec, Material, NewMaterial, NewUser, NewWorker, Order, OrderSpec, PanelSpec, StockEntry,
    Worker,
};
use eco_prom_production::services::{
    Actor, LedgerService, Notifier, OrderService, TransitionAction,
};

/// Environment variable naming the test database.
pub const TEST_DATABASE_ENV: &str = "ECOPROM_TEST_DATABASE_URL";

/// Connect to the test database and apply migrations.
///
/// Returns `None` when [`TEST_DATABASE_ENV`] is unset so database tests can
/// return early on machines without `PostgreSQL`.
pub async fn test_pool() -> Option<PgPool> {
    let url = std::env::var(TEST_DATABASE_ENV).ok()?;
    let pool = db::create_pool(&url.into(), 10)
        .await
        .expect("Failed to connect to test database");
    sqlx::migrate!("../production/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    Some(pool)
}

/// A name no other test run will use.
#[must_use]
pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

/// A notifier with no channel configured.
#[must_use]
pub const fn quiet_notifier(pool: PgPool) -> Notifier {
    Notifier::new(pool, None)
}

/// Create an active user with the given role.
pub async fn create_actor(pool: &PgPool, role: Role) -> Actor {
    let user = UserRepository::new(pool)
        .create_user(&NewUser {
            username: unique(role.as_str()),
            display_name: format!("Test {role}"),
            role,
        })
        .await
        .expect("Failed to create user");
    Actor::new(user.id, user.role)
}

/// Create an active worker user bound to a stage.
pub async fn create_worker(pool: &PgPool, worker_type: WorkerType) -> (Actor, Worker) {
    let actor = create_actor(pool, Role::Worker).await;
    let worker = UserRepository::new(pool)
        .create_worker(NewWorker {
            user_id: actor.user_id,
            worker_type,
        })
        .await
        .expect("Failed to create worker");
    (actor, worker)
}

/// A valid order spec for a stage that needs no door.
#[must_use]
pub fn order_spec(worker_type: WorkerType, deadline: Option<DateTime<Utc>>) -> OrderSpec {
    OrderSpec {
        customer_name: unique("Mijoz"),
        product_name: Some("Sendvich panel".to_owned()),
        worker_type,
        panel: PanelSpec::default(),
        door: DoorSpec::default(),
        area: Decimal::new(4250, 2),
        total_price: Decimal::new(1_500_000, 2),
        prepayment: Decimal::new(500_000, 2),
        deadline,
        comment: None,
        drawing_reference: Some("drawings/test.pdf".to_owned()),
    }
}

/// Drive an order from `KIRITILDI` to `USTA_BOSHLA` with `worker` assigned.
pub async fn started_order(
    service: &OrderService,
    manager: Actor,
    worker: Actor,
    worker_id: WorkerId,
    worker_type: WorkerType,
) -> Order {
    let order = service
        .create_order(&order_spec(worker_type, Some(Utc::now() + Duration::days(7))), manager)
        .await
        .expect("Failed to create order");
    service
        .transition(order.id, TransitionAction::Approve, manager, None)
        .await
        .expect("Failed to approve order");
    service
        .assign_workers(order.id, &[worker_id], manager)
        .await
        .expect("Failed to assign worker");
    service
        .attach_evidence(order.id, EvidenceSlot::Start, "photos/start.jpg", worker)
        .await
        .expect("Failed to attach start evidence");
    service
        .transition(order.id, TransitionAction::WorkerAccept, worker, None)
        .await
        .expect("Failed to accept order");
    service
        .transition(order.id, TransitionAction::WorkerStart, worker, None)
        .await
        .expect("Failed to start order")
        .order
}

/// Create a material and optionally receive opening stock.
pub async fn create_material(pool: &PgPool, opening: Option<Decimal>) -> Material {
    let admin = create_actor(pool, Role::Admin).await;
    let ledger = LedgerService::new(pool.clone());
    let material = ledger
        .create_material(
            &NewMaterial {
                name: unique("Steel"),
                product_name: None,
                category_id: None,
                unit: eco_prom_core::UnitOfMeasure::Kg,
                price_per_unit: eco_prom_core::Money::ZERO,
                min_stock_level: eco_prom_core::StockQuantity::ZERO,
                max_stock_level: None,
                code: None,
            },
            admin,
        )
        .await
        .expect("Failed to create material");

    if let Some(quantity) = opening {
        ledger
            .record_transaction(&stock_entry(&material, TransactionDirection::In, quantity), admin)
            .await
            .expect("Failed to receive opening stock");
    }
    material
}

/// A plain stock entry with no order, note or batch code.
#[must_use]
pub fn stock_entry(
    material: &Material,
    direction: TransactionDirection,
    quantity: Decimal,
) -> StockEntry {
    StockEntry {
        material_id: material.id,
        direction,
        quantity,
        order_id: None,
        note: None,
        received_by: None,
        assign_batch_code: false,
    }
}
