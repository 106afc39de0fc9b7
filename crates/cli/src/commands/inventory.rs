//! Inventory commands: categories, materials and stock movements.
//!
//! # Usage
//!
//! ```bash
//! ecoprom --as ombor category create -n "Metall"
//! ecoprom --as ombor material create -n "Steel-2mm" -u kg --price 12.50 --min 100 -c "Metall"
//! ecoprom --as ombor stock record -m "Steel-2mm" -d IN -q 500 --batch
//! ecoprom --as ombor stock record -m "Steel-2mm" -d OUT -q 42.5 --order ORD-2026-0007
//! ecoprom stock show -m "Steel-2mm"
//! ecoprom stock journal -m "Steel-2mm" --limit 20
//! ecoprom stock low
//! ```

use eco_prom_core::{Money, OrderNumber, StockQuantity, TransactionDirection, UnitOfMeasure};
use eco_prom_production::db::OrderRepository;
use eco_prom_production::models::{NewCategory, NewMaterial, StockEntry};
use eco_prom_production::services::LedgerService;
use eco_prom_production::LedgerError;
use rust_decimal::Decimal;
use serde_json::json;

use super::{CommandError, Context, print_json};

/// Create a material category.
pub async fn create_category(
    ctx: &Context,
    name: &str,
    description: Option<String>,
) -> Result<(), CommandError> {
    let actor = ctx.actor().await?;
    let category = LedgerService::new(ctx.pool.clone())
        .create_category(
            &NewCategory {
                name: name.trim().to_owned(),
                description,
            },
            actor,
        )
        .await?;
    tracing::info!("Category created! ID: {}, Name: {}", category.id, category.name);
    Ok(())
}

/// Arguments for a new material.
#[derive(Debug)]
pub struct MaterialArgs {
    pub name: String,
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub unit: UnitOfMeasure,
    pub price: Decimal,
    pub min_stock: Decimal,
    pub max_stock: Option<Decimal>,
    pub code: Option<String>,
}

/// Create a material with zero stock.
pub async fn create_material(ctx: &Context, args: MaterialArgs) -> Result<(), CommandError> {
    let actor = ctx.actor().await?;
    let ledger = LedgerService::new(ctx.pool.clone());

    let category_id = match args.category.as_deref() {
        Some(name) => Some(
            ledger
                .categories()
                .await?
                .into_iter()
                .find(|c| c.name == name)
                .map(|c| c.id)
                .ok_or_else(|| CommandError::InvalidArgument("category", name.to_owned()))?,
        ),
        None => None,
    };

    let input = NewMaterial {
        name: args.name.trim().to_owned(),
        product_name: args.product_name,
        category_id,
        unit: args.unit,
        price_per_unit: Money::try_new(args.price).map_err(LedgerError::from)?,
        min_stock_level: StockQuantity::try_new(args.min_stock).map_err(LedgerError::from)?,
        max_stock_level: args
            .max_stock
            .map(StockQuantity::try_new)
            .transpose()
            .map_err(LedgerError::from)?,
        code: args.code,
    };

    let material = ledger.create_material(&input, actor).await?;
    tracing::info!(
        "Material created! ID: {}, Name: {}, Unit: {}",
        material.id,
        material.name,
        material.unit
    );
    Ok(())
}

/// Delete a material that has no journal entries.
pub async fn delete_material(ctx: &Context, name: &str) -> Result<(), CommandError> {
    let actor = ctx.actor().await?;
    let ledger = LedgerService::new(ctx.pool.clone());
    let material = ledger.material_by_name(name).await?;
    ledger.delete_material(material.id, actor).await?;
    tracing::info!("Material deleted: {}", material.name);
    Ok(())
}

/// List materials as JSON.
pub async fn list_materials(ctx: &Context) -> Result<(), CommandError> {
    let materials = LedgerService::new(ctx.pool.clone()).materials(None).await?;
    print_json(&materials)
}

/// Arguments for a stock movement.
#[derive(Debug)]
pub struct StockArgs {
    pub material: String,
    pub direction: TransactionDirection,
    pub quantity: Decimal,
    pub order: Option<OrderNumber>,
    pub received_by: Option<String>,
    pub note: Option<String>,
    pub batch: bool,
}

/// Record a stock movement.
pub async fn record(ctx: &Context, args: StockArgs) -> Result<(), CommandError> {
    let actor = ctx.actor().await?;
    let ledger = LedgerService::new(ctx.pool.clone());
    let material = ledger.material_by_name(&args.material).await?;

    let order_id = match args.order {
        Some(number) => Some(
            OrderRepository::new(&ctx.pool)
                .get_by_number(&number)
                .await?
                .map(|o| o.id)
                .ok_or_else(|| CommandError::UnknownOrder(number.to_string()))?,
        ),
        None => None,
    };

    let receipt = ledger
        .record_transaction(
            &StockEntry {
                material_id: material.id,
                direction: args.direction,
                quantity: args.quantity,
                order_id,
                note: args.note,
                received_by: args.received_by,
                assign_batch_code: args.batch,
            },
            actor,
        )
        .await?;

    tracing::info!(
        "{} {} {} {}: now {}",
        receipt.transaction.direction,
        receipt.transaction.quantity,
        material.unit,
        material.name,
        receipt.material_quantity
    );
    if let Some(code) = &receipt.transaction.batch_code {
        tracing::info!("Batch code: {}", code);
    }
    Ok(())
}

/// Show a material with its current stock and its value.
pub async fn show(ctx: &Context, name: &str) -> Result<(), CommandError> {
    let material = LedgerService::new(ctx.pool.clone())
        .material_by_name(name)
        .await?;
    if material.is_low_stock() {
        tracing::warn!(
            "{} is at or below its minimum ({} {})",
            material.name,
            material.min_stock_level,
            material.unit
        );
    }
    print_json(&json!({
        "stock_value": material.stock_value(),
        "material": material,
    }))
}

/// Show the newest journal entries of a material.
pub async fn journal(ctx: &Context, name: &str, limit: i64) -> Result<(), CommandError> {
    let ledger = LedgerService::new(ctx.pool.clone());
    let material = ledger.material_by_name(name).await?;
    let entries = ledger.journal(material.id, limit.max(1)).await?;
    print_json(&entries)
}

/// List materials at or below their minimum stock.
pub async fn low(ctx: &Context) -> Result<(), CommandError> {
    let materials = LedgerService::new(ctx.pool.clone()).low_stock().await?;
    if materials.is_empty() {
        tracing::info!("No materials below minimum stock");
        return Ok(());
    }
    for m in &materials {
        tracing::warn!(
            "{}: {} {} (min {})",
            m.name,
            m.quantity,
            m.unit,
            m.min_stock_level
        );
    }
    print_json(&materials)
}
