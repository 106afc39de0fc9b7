//! Database operations for categories, materials and the stock journal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use eco_prom_core::{
    BatchCode, CategoryId, MaterialId, Money, OrderId, StockQuantity, StockTransactionId,
    TransactionDirection, UserId,
};

use super::{RepositoryError, parse_column};
use crate::models::{Category, Material, NewCategory, NewMaterial, StockTransaction};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: CategoryId::new(row.id),
            name: row.name,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MaterialRow {
    id: i32,
    name: String,
    product_name: Option<String>,
    category_id: Option<i32>,
    unit: String,
    quantity: Decimal,
    price_per_unit: Decimal,
    min_stock_level: Decimal,
    max_stock_level: Option<Decimal>,
    code: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn stock_column(value: Decimal) -> Result<StockQuantity, RepositoryError> {
    StockQuantity::try_new(value).map_err(|e| RepositoryError::DataCorruption(e.to_string()))
}

impl TryFrom<MaterialRow> for Material {
    type Error = RepositoryError;

    fn try_from(row: MaterialRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: MaterialId::new(row.id),
            name: row.name,
            product_name: row.product_name,
            category_id: row.category_id.map(CategoryId::new),
            unit: parse_column(&row.unit)?,
            quantity: stock_column(row.quantity)?,
            price_per_unit: Money::try_new(row.price_per_unit)
                .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?,
            min_stock_level: stock_column(row.min_stock_level)?,
            max_stock_level: row.max_stock_level.map(stock_column).transpose()?,
            code: row.code,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockTransactionRow {
    id: Uuid,
    material_id: i32,
    direction: String,
    quantity: Decimal,
    batch_code: Option<String>,
    order_id: Option<i32>,
    performed_by: i32,
    received_by: Option<String>,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<StockTransactionRow> for StockTransaction {
    type Error = RepositoryError;

    fn try_from(row: StockTransactionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: StockTransactionId::from_uuid(row.id),
            material_id: MaterialId::new(row.material_id),
            direction: parse_column(&row.direction)?,
            quantity: stock_column(row.quantity)?,
            batch_code: row
                .batch_code
                .as_deref()
                .map(parse_column::<BatchCode>)
                .transpose()?,
            order_id: row.order_id.map(OrderId::new),
            performed_by: UserId::new(row.performed_by),
            received_by: row.received_by,
            note: row.note,
            created_at: row.created_at,
        })
    }
}

const MATERIAL_COLUMNS: &str = "
    id, name, product_name, category_id, unit, quantity, price_per_unit,
    min_stock_level, max_stock_level, code, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "
    id, material_id, direction, quantity, batch_code, order_id,
    performed_by, received_by, note, created_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for material reads and catalogue maintenance.
///
/// Stock quantities are never written here; see the transaction-scoped
/// functions below, used by the ledger.
pub struct MaterialRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MaterialRepository<'a> {
    /// Create a new material repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create_category(&self, input: &NewCategory) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "INSERT INTO category (name, description) VALUES ($1, $2)
             RETURNING id, name, description, created_at",
        )
        .bind(&input.name)
        .bind(&input.description)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "category already exists"))?;

        Ok(row.into())
    }

    /// List categories by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, description, created_at FROM category ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Materials
    // =========================================================================

    /// Create a material with zero stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name or code is taken.
    pub async fn create_material(&self, input: &NewMaterial) -> Result<Material, RepositoryError> {
        let row = sqlx::query_as::<_, MaterialRow>(&format!(
            "INSERT INTO material (
                name, product_name, category_id, unit, price_per_unit,
                min_stock_level, max_stock_level, code
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {MATERIAL_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(&input.product_name)
        .bind(input.category_id)
        .bind(input.unit.as_str())
        .bind(input.price_per_unit.amount())
        .bind(input.min_stock_level.value())
        .bind(input.max_stock_level.map(|q| q.value()))
        .bind(&input.code)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "material name or code already exists"))?;

        row.try_into()
    }

    /// Get a material by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: MaterialId) -> Result<Option<Material>, RepositoryError> {
        let row = sqlx::query_as::<_, MaterialRow>(&format!(
            "SELECT {MATERIAL_COLUMNS} FROM material WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a material by its unique name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Material>, RepositoryError> {
        let row = sqlx::query_as::<_, MaterialRow>(&format!(
            "SELECT {MATERIAL_COLUMNS} FROM material WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// List materials by name, optionally within one category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        category: Option<CategoryId>,
    ) -> Result<Vec<Material>, RepositoryError> {
        let rows = sqlx::query_as::<_, MaterialRow>(&format!(
            "SELECT {MATERIAL_COLUMNS} FROM material
             WHERE ($1::int IS NULL OR category_id = $1)
             ORDER BY name"
        ))
        .bind(category)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Materials at or below their minimum stock level.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(&self) -> Result<Vec<Material>, RepositoryError> {
        let rows = sqlx::query_as::<_, MaterialRow>(&format!(
            "SELECT {MATERIAL_COLUMNS} FROM material
             WHERE quantity <= min_stock_level
             ORDER BY quantity - min_stock_level, name"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Last committed quantity, read without locking.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the material does not exist.
    pub async fn current_stock(&self, id: MaterialId) -> Result<StockQuantity, RepositoryError> {
        let quantity = sqlx::query_scalar::<_, Decimal>("SELECT quantity FROM material WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        stock_column(quantity)
    }

    /// Delete a material that no journal entry references.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if transactions reference the
    /// material, `RepositoryError::NotFound` if it does not exist.
    pub async fn delete(&self, id: MaterialId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM material WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| {
                RepositoryError::conflict_on_foreign_key(e, "material has stock transactions")
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Journal
    // =========================================================================

    /// Journal entries for a material, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn transactions(
        &self,
        material: MaterialId,
        limit: i64,
    ) -> Result<Vec<StockTransaction>, RepositoryError> {
        let rows = sqlx::query_as::<_, StockTransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM stock_transaction
             WHERE material_id = $1
             ORDER BY created_at DESC
             LIMIT $2"
        ))
        .bind(material)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Journal entries linked to an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn transactions_for_order(
        &self,
        order: OrderId,
    ) -> Result<Vec<StockTransaction>, RepositoryError> {
        let rows = sqlx::query_as::<_, StockTransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM stock_transaction
             WHERE order_id = $1
             ORDER BY created_at"
        ))
        .bind(order)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Read a material and hold its row lock until the transaction ends.
///
/// Writers to the same material queue here; writers to other materials are
/// unaffected.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_material(
    conn: &mut PgConnection,
    id: MaterialId,
) -> Result<Option<Material>, RepositoryError> {
    let row = sqlx::query_as::<_, MaterialRow>(&format!(
        "SELECT {MATERIAL_COLUMNS} FROM material WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(TryInto::try_into).transpose()
}

/// Overwrite a locked material's quantity.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the material does not exist.
pub async fn set_quantity(
    conn: &mut PgConnection,
    id: MaterialId,
    quantity: StockQuantity,
) -> Result<(), RepositoryError> {
    let result =
        sqlx::query("UPDATE material SET quantity = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(quantity.value())
            .execute(&mut *conn)
            .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Unique constraint on journal batch codes.
const BATCH_CODE_CONSTRAINT: &str = "stock_transaction_batch_code_key";

fn batch_code_error(err: sqlx::Error, code: Option<&BatchCode>) -> RepositoryError {
    if let (sqlx::Error::Database(db_err), Some(code)) = (&err, code)
        && db_err.constraint() == Some(BATCH_CODE_CONSTRAINT)
    {
        return RepositoryError::BatchCodeTaken(code.as_str().to_owned());
    }
    RepositoryError::Database(err)
}

/// A journal row to append.
#[derive(Debug)]
pub struct TransactionInsert<'a> {
    pub id: StockTransactionId,
    pub material_id: MaterialId,
    pub direction: TransactionDirection,
    pub quantity: StockQuantity,
    pub batch_code: Option<BatchCode>,
    pub order_id: Option<OrderId>,
    pub performed_by: UserId,
    pub received_by: Option<&'a str>,
    pub note: Option<&'a str>,
}

/// Append a journal row.
///
/// # Errors
///
/// Returns `RepositoryError::BatchCodeTaken` if another entry holds the
/// batch code. Run it in a savepoint to retry with a new code.
pub async fn insert_transaction(
    conn: &mut PgConnection,
    insert: &TransactionInsert<'_>,
) -> Result<StockTransaction, RepositoryError> {
    let row = sqlx::query_as::<_, StockTransactionRow>(&format!(
        "INSERT INTO stock_transaction (
            id, material_id, direction, quantity, batch_code, order_id,
            performed_by, received_by, note
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING {TRANSACTION_COLUMNS}"
    ))
    .bind(insert.id)
    .bind(insert.material_id)
    .bind(insert.direction.as_str())
    .bind(insert.quantity.value())
    .bind(insert.batch_code.as_ref().map(BatchCode::as_str))
    .bind(insert.order_id)
    .bind(insert.performed_by)
    .bind(insert.received_by)
    .bind(insert.note)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| batch_code_error(e, insert.batch_code.as_ref()))?;

    row.try_into()
}
