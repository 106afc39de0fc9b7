//! Inventory ledger.
//!
//! A material's quantity and its journal only change together, inside one
//! transaction that holds the material's row lock. Writers to the same
//! material queue on that lock; writers to different materials never wait
//! on each other.

use sqlx::{Acquire, PgPool, Postgres, Transaction};
use tracing::{debug, info, instrument, warn};

use eco_prom_core::{
    BatchCode, CategoryId, MaterialId, OrderId, StockQuantity, StockTransactionId,
    TransactionDirection,
};

use crate::db::materials::{self, TransactionInsert};
use crate::db::{MaterialRepository, RepositoryError};
use crate::error::LedgerError;
use crate::models::{
    Category, LedgerReceipt, Material, NewCategory, NewMaterial, StockEntry, StockTransaction,
};
use crate::services::authz::{Action, Actor};

/// How many random batch codes are tried before giving up.
pub const BATCH_CODE_ATTEMPTS: u32 = 8;

/// Journal entries returned per material by default.
pub const DEFAULT_JOURNAL_LIMIT: i64 = 50;

/// Service for stock movements and material records.
#[derive(Debug, Clone)]
pub struct LedgerService {
    pool: PgPool,
}

fn authorize(actor: &Actor, action: Action) -> Result<(), LedgerError> {
    if actor.can(action) {
        Ok(())
    } else {
        Err(LedgerError::Forbidden {
            role: actor.role,
            action,
        })
    }
}

fn not_found_as_ledger(err: RepositoryError) -> LedgerError {
    match err {
        RepositoryError::NotFound => LedgerError::NotFound,
        other => LedgerError::Repository(other),
    }
}

/// Quantity on hand after applying a movement.
///
/// # Errors
///
/// - `LedgerError::InsufficientStock` when an `OUT` exceeds stock
/// - `LedgerError::StockOverflow` when an `IN` passes [`StockQuantity::MAX`]
pub fn apply_movement(
    on_hand: StockQuantity,
    direction: TransactionDirection,
    quantity: StockQuantity,
) -> Result<StockQuantity, LedgerError> {
    match direction {
        TransactionDirection::In => {
            on_hand
                .checked_add(quantity)
                .ok_or(LedgerError::StockOverflow {
                    available: on_hand,
                    requested: quantity,
                })
        }
        TransactionDirection::Out => {
            on_hand
                .checked_sub(quantity)
                .ok_or(LedgerError::InsufficientStock {
                    available: on_hand,
                    requested: quantity,
                })
        }
    }
}

/// Append a receipt under a batch code drawn from `next_code`.
///
/// Each attempt inserts inside a savepoint, so a code taken by another
/// receipt, committed or racing, only costs that attempt.
///
/// # Errors
///
/// Returns `LedgerError::BatchCodeExhausted` after [`BATCH_CODE_ATTEMPTS`]
/// taken codes. The enclosing transaction stays usable.
pub async fn insert_with_batch_code(
    tx: &mut Transaction<'_, Postgres>,
    mut insert: TransactionInsert<'_>,
    mut next_code: impl FnMut() -> BatchCode,
) -> Result<StockTransaction, LedgerError> {
    for attempt in 1..=BATCH_CODE_ATTEMPTS {
        insert.batch_code = Some(next_code());
        let mut savepoint = Acquire::begin(&mut *tx).await?;
        match materials::insert_transaction(&mut savepoint, &insert).await {
            Ok(transaction) => {
                savepoint.commit().await?;
                return Ok(transaction);
            }
            Err(RepositoryError::BatchCodeTaken(code)) => {
                savepoint.rollback().await?;
                debug!(attempt, code = %code, "Batch code taken, regenerating");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(LedgerError::BatchCodeExhausted {
        attempts: BATCH_CODE_ATTEMPTS,
    })
}

impl LedgerService {
    /// Create a new ledger service.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a stock movement and update the material's quantity.
    ///
    /// Either both the quantity update and the journal entry commit, or
    /// neither does.
    ///
    /// # Errors
    ///
    /// - `LedgerError::InvalidQuantity` unless the quantity is positive with
    ///   at most three fractional digits and no larger than
    ///   [`StockQuantity::MAX`]
    /// - `LedgerError::InsufficientStock` if an `OUT` exceeds stock
    /// - `LedgerError::StockOverflow` if an `IN` would pass the maximum
    /// - `LedgerError::NotFound` if the material does not exist
    /// - `LedgerError::BatchCodeNotAllowed` for a batch code on an `OUT`
    #[instrument(
        skip(self, entry),
        fields(
            material_id = %entry.material_id,
            direction = %entry.direction,
            quantity = %entry.quantity,
            user_id = %actor.user_id
        )
    )]
    pub async fn record_transaction(
        &self,
        entry: &StockEntry,
        actor: Actor,
    ) -> Result<LedgerReceipt, LedgerError> {
        authorize(&actor, Action::RecordStock)?;
        let quantity = StockQuantity::positive(entry.quantity)?;
        if entry.assign_batch_code && entry.direction == TransactionDirection::Out {
            return Err(LedgerError::BatchCodeNotAllowed);
        }

        let mut tx = self.pool.begin().await?;
        let material = materials::lock_material(&mut tx, entry.material_id)
            .await?
            .ok_or(LedgerError::NotFound)?;

        let new_quantity = apply_movement(material.quantity, entry.direction, quantity)?;

        materials::set_quantity(&mut tx, material.id, new_quantity).await?;
        let insert = TransactionInsert {
            id: StockTransactionId::generate(),
            material_id: material.id,
            direction: entry.direction,
            quantity,
            batch_code: None,
            order_id: entry.order_id,
            performed_by: actor.user_id,
            received_by: entry.received_by.as_deref(),
            note: entry.note.as_deref(),
        };
        let transaction = if entry.assign_batch_code {
            insert_with_batch_code(&mut tx, insert, || {
                BatchCode::generate(&material.name, &mut rand::rng())
            })
            .await?
        } else {
            materials::insert_transaction(&mut tx, &insert).await?
        };
        tx.commit().await?;

        info!(
            material = %material.name,
            before = %material.quantity,
            after = %new_quantity,
            batch_code = ?transaction.batch_code.as_ref().map(BatchCode::as_str),
            "Stock transaction recorded"
        );
        if new_quantity <= material.min_stock_level {
            warn!(
                material = %material.name,
                quantity = %new_quantity,
                min_stock_level = %material.min_stock_level,
                "Material at or below minimum stock"
            );
        }

        Ok(LedgerReceipt {
            material_quantity: new_quantity,
            transaction,
        })
    }

    /// Last committed quantity of a material. Takes no lock.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NotFound` if the material does not exist.
    pub async fn current_stock(&self, id: MaterialId) -> Result<StockQuantity, LedgerError> {
        MaterialRepository::new(&self.pool)
            .current_stock(id)
            .await
            .map_err(not_found_as_ledger)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Forbidden` or a conflict on a duplicate name.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_category(
        &self,
        input: &NewCategory,
        actor: Actor,
    ) -> Result<Category, LedgerError> {
        authorize(&actor, Action::ManageInventory)?;
        let category = MaterialRepository::new(&self.pool)
            .create_category(input)
            .await?;
        info!(category_id = %category.id, "Category created");
        Ok(category)
    }

    /// All categories.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Repository` if the query fails.
    pub async fn categories(&self) -> Result<Vec<Category>, LedgerError> {
        Ok(MaterialRepository::new(&self.pool).list_categories().await?)
    }

    /// Create a material with zero stock.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Forbidden` or a conflict on a duplicate name or
    /// code.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_material(
        &self,
        input: &NewMaterial,
        actor: Actor,
    ) -> Result<Material, LedgerError> {
        authorize(&actor, Action::ManageInventory)?;
        let material = MaterialRepository::new(&self.pool)
            .create_material(input)
            .await?;
        info!(material_id = %material.id, "Material created");
        Ok(material)
    }

    /// Get a material.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NotFound` if the material does not exist.
    pub async fn material(&self, id: MaterialId) -> Result<Material, LedgerError> {
        MaterialRepository::new(&self.pool)
            .get(id)
            .await?
            .ok_or(LedgerError::NotFound)
    }

    /// Get a material by its unique name.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NotFound` if the material does not exist.
    pub async fn material_by_name(&self, name: &str) -> Result<Material, LedgerError> {
        MaterialRepository::new(&self.pool)
            .get_by_name(name)
            .await?
            .ok_or(LedgerError::NotFound)
    }

    /// Materials, optionally limited to a category.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Repository` if the query fails.
    pub async fn materials(
        &self,
        category: Option<CategoryId>,
    ) -> Result<Vec<Material>, LedgerError> {
        Ok(MaterialRepository::new(&self.pool).list(category).await?)
    }

    /// Materials at or below their minimum level.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Repository` if the query fails.
    pub async fn low_stock(&self) -> Result<Vec<Material>, LedgerError> {
        Ok(MaterialRepository::new(&self.pool).low_stock().await?)
    }

    /// Journal of a material, newest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Repository` if the query fails.
    pub async fn journal(
        &self,
        id: MaterialId,
        limit: i64,
    ) -> Result<Vec<StockTransaction>, LedgerError> {
        Ok(MaterialRepository::new(&self.pool)
            .transactions(id, limit)
            .await?)
    }

    /// Journal entries that reference an order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Repository` if the query fails.
    pub async fn order_transactions(
        &self,
        order: OrderId,
    ) -> Result<Vec<StockTransaction>, LedgerError> {
        Ok(MaterialRepository::new(&self.pool)
            .transactions_for_order(order)
            .await?)
    }

    /// Delete a material with no journal entries.
    ///
    /// # Errors
    ///
    /// - `LedgerError::NotFound` if the material does not exist
    /// - `LedgerError::Repository` with a conflict while entries reference it
    #[instrument(skip(self), fields(material_id = %id, user_id = %actor.user_id))]
    pub async fn delete_material(&self, id: MaterialId, actor: Actor) -> Result<(), LedgerError> {
        authorize(&actor, Action::ManageInventory)?;
        MaterialRepository::new(&self.pool)
            .delete(id)
            .await
            .map_err(not_found_as_ledger)?;
        info!("Material deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use eco_prom_core::{Role, UserId};
    use rust_decimal::Decimal;

    use super::*;

    fn qty(value: &str) -> StockQuantity {
        StockQuantity::try_new(value.parse::<Decimal>().unwrap()).unwrap()
    }

    #[test]
    fn test_out_within_stock() {
        let after = apply_movement(qty("10"), TransactionDirection::Out, qty("6")).unwrap();
        assert_eq!(after.to_string(), "4.000");
    }

    #[test]
    fn test_out_beyond_stock_reports_both_values() {
        let err = apply_movement(qty("4"), TransactionDirection::Out, qty("5")).unwrap_err();
        match err {
            LedgerError::InsufficientStock {
                available,
                requested,
            } => {
                assert_eq!(available.to_string(), "4.000");
                assert_eq!(requested.to_string(), "5.000");
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn test_out_of_everything_leaves_zero() {
        let after = apply_movement(qty("2.5"), TransactionDirection::Out, qty("2.500")).unwrap();
        assert_eq!(after, StockQuantity::ZERO);
    }

    #[test]
    fn test_in_adds() {
        let after = apply_movement(qty("0.125"), TransactionDirection::In, qty("3")).unwrap();
        assert_eq!(after.to_string(), "3.125");
    }

    #[test]
    fn test_in_past_max_overflows() {
        let err = apply_movement(qty("99999999990"), TransactionDirection::In, qty("10")).unwrap_err();
        match err {
            LedgerError::StockOverflow {
                available,
                requested,
            } => {
                assert_eq!(available.to_string(), "99999999990.000");
                assert_eq!(requested.to_string(), "10.000");
            }
            other => panic!("expected StockOverflow, got {other:?}"),
        }
        assert_eq!(
            apply_movement(qty("99999999990"), TransactionDirection::In, qty("9.999")).unwrap(),
            StockQuantity::MAX
        );
    }

    #[test]
    fn test_ledger_permissions() {
        let worker = Actor::new(UserId::new(4), Role::Worker);
        assert!(matches!(
            authorize(&worker, Action::RecordStock),
            Err(LedgerError::Forbidden { .. })
        ));
        let lead = Actor::new(UserId::new(2), Role::ProductionLead);
        assert!(authorize(&lead, Action::RecordStock).is_ok());
        assert!(authorize(&lead, Action::ManageInventory).is_err());
    }

    #[test]
    fn test_not_found_mapping() {
        assert!(matches!(
            not_found_as_ledger(RepositoryError::NotFound),
            LedgerError::NotFound
        ));
        assert!(matches!(
            not_found_as_ledger(RepositoryError::Conflict("x".to_owned())),
            LedgerError::Repository(RepositoryError::Conflict(_))
        ));
    }
}
