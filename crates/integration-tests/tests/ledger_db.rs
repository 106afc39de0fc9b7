//! Stock ledger against `PostgreSQL`.
//!
//! Requires `ECOPROM_TEST_DATABASE_URL`; every test returns early without it.

#![allow(clippy::unwrap_used)]

use eco_prom_core::{
    BatchCode, Role, StockQuantity, StockTransactionId, TransactionDirection, WorkerType,
};
use eco_prom_integration_tests::{
    create_actor, create_material, order_spec, quiet_notifier, stock_entry, test_pool,
};
use eco_prom_production::LedgerError;
use eco_prom_production::db::RepositoryError;
use eco_prom_production::db::materials::{self, TransactionInsert};
use eco_prom_production::models::Material;
use eco_prom_production::services::{Actor, LedgerService, OrderService};
use eco_prom_production::services::ledger::{BATCH_CODE_ATTEMPTS, insert_with_batch_code};
use rust_decimal::Decimal;
use sqlx::PgPool;

fn qty(value: i64) -> StockQuantity {
    StockQuantity::try_new(Decimal::from(value)).unwrap()
}

#[tokio::test]
async fn test_concurrent_outs_never_oversell() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let ledger = LedgerService::new(pool.clone());
    let lead = create_actor(&pool, Role::ProductionLead).await;
    let material = create_material(&pool, Some(Decimal::from(10))).await;

    let six = stock_entry(&material, TransactionDirection::Out, Decimal::from(6));
    let five = stock_entry(&material, TransactionDirection::Out, Decimal::from(5));
    let (a, b) = tokio::join!(
        ledger.record_transaction(&six, lead),
        ledger.record_transaction(&five, lead),
    );

    // Whichever wins the row lock commits; the other sees what it left.
    let (remaining, available, requested) = match (a, b) {
        (Ok(receipt), Err(LedgerError::InsufficientStock { available, requested })) => {
            (receipt.material_quantity, available, requested)
        }
        (Err(LedgerError::InsufficientStock { available, requested }), Ok(receipt)) => {
            (receipt.material_quantity, available, requested)
        }
        other => panic!("exactly one OUT should succeed, got {other:?}"),
    };
    assert_eq!(available, remaining);
    assert!(
        (remaining, requested) == (qty(4), qty(5)) || (remaining, requested) == (qty(5), qty(6)),
        "unexpected outcome: {remaining} left, {requested} refused"
    );

    assert_eq!(ledger.current_stock(material.id).await.unwrap(), remaining);
    let journal = ledger.journal(material.id, 10).await.unwrap();
    assert_eq!(journal.len(), 2, "opening receipt and one OUT");
}

#[tokio::test]
async fn test_many_concurrent_receipts_all_count() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let ledger = LedgerService::new(pool.clone());
    let lead = create_actor(&pool, Role::ProductionLead).await;
    let material = create_material(&pool, None).await;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let ledger = ledger.clone();
            let mut entry = stock_entry(&material, TransactionDirection::In, Decimal::new(1250, 3));
            entry.assign_batch_code = true;
            tokio::spawn(async move { ledger.record_transaction(&entry, lead).await })
        })
        .collect();

    let mut codes = Vec::new();
    for handle in handles {
        let receipt = handle.await.unwrap().unwrap();
        codes.push(receipt.transaction.batch_code.expect("batch code on IN"));
    }

    let total = ledger.current_stock(material.id).await.unwrap();
    assert_eq!(total.to_string(), "12.500");

    codes.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    codes.dedup_by(|a, b| a.as_str() == b.as_str());
    assert_eq!(codes.len(), 10, "batch codes are unique");
}

#[tokio::test]
async fn test_rejected_entries_leave_no_trace() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let ledger = LedgerService::new(pool.clone());
    let lead = create_actor(&pool, Role::ProductionLead).await;
    let worker = create_actor(&pool, Role::Worker).await;
    let material = create_material(&pool, Some(Decimal::from(3))).await;

    let too_much = stock_entry(&material, TransactionDirection::Out, Decimal::from(4));
    assert!(matches!(
        ledger.record_transaction(&too_much, lead).await,
        Err(LedgerError::InsufficientStock { .. })
    ));

    let too_precise = stock_entry(&material, TransactionDirection::In, Decimal::new(10_001, 4));
    assert!(matches!(
        ledger.record_transaction(&too_precise, lead).await,
        Err(LedgerError::InvalidQuantity(_))
    ));

    let mut batch_out = stock_entry(&material, TransactionDirection::Out, Decimal::ONE);
    batch_out.assign_batch_code = true;
    assert!(matches!(
        ledger.record_transaction(&batch_out, lead).await,
        Err(LedgerError::BatchCodeNotAllowed)
    ));

    let fine = stock_entry(&material, TransactionDirection::Out, Decimal::ONE);
    assert!(matches!(
        ledger.record_transaction(&fine, worker).await,
        Err(LedgerError::Forbidden { .. })
    ));

    assert_eq!(ledger.current_stock(material.id).await.unwrap(), qty(3));
    assert_eq!(ledger.journal(material.id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_material_with_history_cannot_be_deleted() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let ledger = LedgerService::new(pool.clone());
    let admin = create_actor(&pool, Role::Admin).await;

    let used = create_material(&pool, Some(Decimal::from(1))).await;
    let err = ledger.delete_material(used.id, admin).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Repository(RepositoryError::Conflict(_))
    ));
    assert!(ledger.material(used.id).await.is_ok());

    let unused = create_material(&pool, None).await;
    ledger.delete_material(unused.id, admin).await.unwrap();
    assert!(matches!(
        ledger.material(unused.id).await,
        Err(LedgerError::NotFound)
    ));
    assert!(matches!(
        ledger.delete_material(unused.id, admin).await,
        Err(LedgerError::NotFound)
    ));
}

#[tokio::test]
async fn test_oversized_receipts_are_input_errors() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let ledger = LedgerService::new(pool.clone());
    let lead = create_actor(&pool, Role::ProductionLead).await;
    let material = create_material(&pool, Some(Decimal::from(99_999_999_990_i64))).await;

    let huge = stock_entry(&material, TransactionDirection::In, Decimal::from(1_000_000_000_000_i64));
    assert!(matches!(
        ledger.record_transaction(&huge, lead).await,
        Err(LedgerError::InvalidQuantity(_))
    ));

    let past_max = stock_entry(&material, TransactionDirection::In, Decimal::from(10));
    assert!(matches!(
        ledger.record_transaction(&past_max, lead).await,
        Err(LedgerError::StockOverflow { .. })
    ));

    let to_max = stock_entry(&material, TransactionDirection::In, Decimal::new(9_999, 3));
    let receipt = ledger.record_transaction(&to_max, lead).await.unwrap();
    assert_eq!(receipt.material_quantity, StockQuantity::MAX);
    assert_eq!(ledger.journal(material.id, 10).await.unwrap().len(), 2);
}

/// Receive one unit under a batch code and return the code.
async fn receipt_code(pool: &PgPool, material: &Material, lead: Actor) -> BatchCode {
    let mut entry = stock_entry(material, TransactionDirection::In, Decimal::ONE);
    entry.assign_batch_code = true;
    LedgerService::new(pool.clone())
        .record_transaction(&entry, lead)
        .await
        .unwrap()
        .transaction
        .batch_code
        .unwrap()
}

fn receipt(material: &Material, lead: Actor) -> TransactionInsert<'static> {
    TransactionInsert {
        id: StockTransactionId::generate(),
        material_id: material.id,
        direction: TransactionDirection::In,
        quantity: StockQuantity::positive(Decimal::ONE).unwrap(),
        batch_code: None,
        order_id: None,
        performed_by: lead.user_id,
        received_by: None,
        note: None,
    }
}

#[tokio::test]
async fn test_taken_batch_code_is_redrawn() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let lead = create_actor(&pool, Role::ProductionLead).await;
    let material = create_material(&pool, None).await;
    let taken = receipt_code(&pool, &material, lead).await;

    let mut drawn = Vec::new();
    let mut tx = pool.begin().await.unwrap();
    let row = insert_with_batch_code(&mut tx, receipt(&material, lead), || {
        let code = if drawn.is_empty() {
            taken.clone()
        } else {
            BatchCode::generate(&material.name, &mut rand::rng())
        };
        drawn.push(code.clone());
        code
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(drawn.len(), 2);
    assert_eq!(row.batch_code.as_ref(), drawn.last());
    assert_ne!(row.batch_code, Some(taken));
}

#[tokio::test]
async fn test_batch_codes_give_up_without_poisoning_the_transaction() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let lead = create_actor(&pool, Role::ProductionLead).await;
    let material = create_material(&pool, None).await;
    let taken = receipt_code(&pool, &material, lead).await;

    let mut attempts = 0;
    let mut tx = pool.begin().await.unwrap();
    let err = insert_with_batch_code(&mut tx, receipt(&material, lead), || {
        attempts += 1;
        taken.clone()
    })
    .await
    .unwrap_err();
    assert!(matches!(err, LedgerError::BatchCodeExhausted { .. }));
    assert_eq!(attempts, BATCH_CODE_ATTEMPTS);

    // Failed attempts only rolled back their savepoints.
    let plain = materials::insert_transaction(&mut tx, &receipt(&material, lead))
        .await
        .unwrap();
    assert_eq!(plain.batch_code, None);
    tx.rollback().await.unwrap();
}

#[tokio::test]
async fn test_order_lists_its_stock_movements() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let ledger = LedgerService::new(pool.clone());
    let lead = create_actor(&pool, Role::ProductionLead).await;
    let manager = create_actor(&pool, Role::Manager).await;
    let material = create_material(&pool, Some(Decimal::from(20))).await;
    let order = OrderService::new(pool.clone(), quiet_notifier(pool.clone()))
        .create_order(&order_spec(WorkerType::List, None), manager)
        .await
        .unwrap();

    for quantity in [3, 4] {
        let mut entry = stock_entry(&material, TransactionDirection::Out, Decimal::from(quantity));
        entry.order_id = Some(order.id);
        ledger.record_transaction(&entry, lead).await.unwrap();
    }
    // Not tied to the order.
    ledger
        .record_transaction(&stock_entry(&material, TransactionDirection::Out, Decimal::ONE), lead)
        .await
        .unwrap();

    let movements = ledger.order_transactions(order.id).await.unwrap();
    let quantities: Vec<_> = movements.iter().map(|t| t.quantity).collect();
    assert_eq!(quantities, vec![qty(3), qty(4)]);
    assert!(movements.iter().all(|t| t.order_id == Some(order.id)));
}

