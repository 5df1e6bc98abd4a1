//! Shared test utilities for the stock ledger.
//!
//! This module provides helpers for setting up an in-memory ledger and seeding
//! it with catalog records and stock. Stock is always seeded through the
//! ledger's own workflows, so every seeded quantity has a matching movement
//! and the log still reconciles.

use crate::{
    entities::{RefType, material, product, purchase},
    errors::Result,
    ledger::{
        Ledger,
        catalog::{NewProduct, create_material, create_product},
        movement::Cause,
        purchase::{NewPurchase, record_purchase},
        stock::credit_finished_goods,
    },
};
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait};

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a ledger over a fresh in-memory database with default pricing.
/// This is the standard setup for all workflow tests.
pub async fn setup_test_ledger() -> Result<Ledger> {
    Ok(Ledger::new(setup_test_db().await?))
}

/// Creates a test material with zero stock and no threshold.
pub async fn create_test_material(ledger: &Ledger, name: &str) -> Result<material::Model> {
    create_material(ledger, name, 0.0).await
}

/// Creates a test product with the given recipe.
///
/// # Defaults
/// * `price_base`: 20.0
/// * `threshold`: 0
pub async fn create_test_product(
    ledger: &Ledger,
    name: &str,
    recipe: &[(i64, f64)],
) -> Result<product::Model> {
    create_product(
        ledger,
        NewProduct {
            name: name.to_string(),
            price_base: 20.0,
            recipe: recipe.to_vec(),
            threshold: 0,
        },
    )
    .await
}

/// Adds grams to a material by booking a purchase.
pub async fn stock_material(
    ledger: &Ledger,
    material_id: i64,
    grams: f64,
) -> Result<purchase::Model> {
    record_purchase(
        ledger,
        NewPurchase {
            material_id,
            grams,
            cost: 0.0,
            operator: "test".to_string(),
        },
    )
    .await
}

/// Adds finished packages to a product with a manual adjustment.
pub async fn stock_finished_goods(ledger: &Ledger, product_id: i64, packages: i32) -> Result<()> {
    let txn = ledger.begin_write().await?;
    credit_finished_goods(
        txn.conn(),
        product_id,
        packages,
        &Cause::new(RefType::Adjust, product_id).by(Some("test")),
    )
    .await?;
    txn.commit().await
}

/// Number of rows in the movement log.
pub async fn count_movements(ledger: &Ledger) -> Result<u64> {
    Ok(crate::entities::Movement::find().count(ledger.db()).await?)
}

