//! Material and stock journal domain models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use eco_prom_core::{
    BatchCode, CategoryId, MaterialId, Money, OrderId, StockQuantity, StockTransactionId,
    TransactionDirection, UnitOfMeasure, UserId,
};

/// A material category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a category.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

/// A stocked material with its running quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    /// Unique material name.
    pub name: String,
    pub product_name: Option<String>,
    pub category_id: Option<CategoryId>,
    pub unit: UnitOfMeasure,
    /// Current stock. Only the ledger changes this.
    pub quantity: StockQuantity,
    pub price_per_unit: Money,
    /// Stock at or below this level is reported as low.
    pub min_stock_level: StockQuantity,
    pub max_stock_level: Option<StockQuantity>,
    /// Optional QR/barcode, unique when present.
    pub code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Material {
    /// Whether stock has fallen to or below the minimum level.
    #[must_use]
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock_level
    }

    /// Value of the stock on hand at the unit price, rounded to money scale.
    #[must_use]
    pub fn stock_value(&self) -> Decimal {
        (self.quantity.value() * self.price_per_unit.amount()).round_dp(Money::SCALE)
    }
}

/// Input for creating a material. New materials start with zero stock.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMaterial {
    pub name: String,
    pub product_name: Option<String>,
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub unit: UnitOfMeasure,
    pub price_per_unit: Money,
    pub min_stock_level: StockQuantity,
    pub max_stock_level: Option<StockQuantity>,
    pub code: Option<String>,
}

/// An immutable stock journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: StockTransactionId,
    pub material_id: MaterialId,
    pub direction: TransactionDirection,
    /// Always positive; the direction carries the sign.
    pub quantity: StockQuantity,
    pub batch_code: Option<BatchCode>,
    pub order_id: Option<OrderId>,
    pub performed_by: UserId,
    /// Who physically received or took the goods.
    pub received_by: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A request to move stock in or out.
#[derive(Debug, Clone, Deserialize)]
pub struct StockEntry {
    pub material_id: MaterialId,
    pub direction: TransactionDirection,
    /// Raw quantity; must be positive with at most three fractional digits.
    pub quantity: Decimal,
    pub order_id: Option<OrderId>,
    pub note: Option<String>,
    pub received_by: Option<String>,
    /// Assign a batch code (receipts only).
    #[serde(default)]
    pub assign_batch_code: bool,
}

/// Result of a committed stock movement.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerReceipt {
    /// Material quantity after the movement.
    pub material_quantity: StockQuantity,
    /// The journal entry that was written.
    pub transaction: StockTransaction,
}
