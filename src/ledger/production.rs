//! Production business logic - Turning materials into finished goods.
//!
//! A batch is validated as a whole: requirements for every item are summed
//! per material and checked against stock before the first deduction, so a
//! batch either produces everything or nothing.

use crate::{
    entities::{RefType, product, recipe_line},
    errors::{Error, Result},
    ledger::{
        Ledger,
        movement::Cause,
        stock::{
            MaterialRequirements, StockChange, check_requirements, credit_finished_goods,
            deduct_finished_goods, deduct_material,
        },
        store::{find_product, recipe_for},
    },
};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// One product of a production batch.
#[derive(Debug, Clone)]
pub struct ProductionItem {
    /// Product to make
    pub product_id: i64,
    /// Packages to make
    pub qty: i32,
    /// Display name of the operator
    pub operator: Option<String>,
}

/// Finished stock of one product after a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Produced {
    /// Product made
    pub product_id: i64,
    /// Packages made in this batch
    pub qty: i32,
    /// Finished stock after the batch
    pub stock: i32,
}

/// Produces every item of the batch or nothing.
#[instrument(skip(ledger, items), fields(items = items.len()))]
pub async fn produce(ledger: &Ledger, items: Vec<ProductionItem>) -> Result<Vec<Produced>> {
    if items.is_empty() {
        return Err(Error::validation("production batch must not be empty"));
    }
    if let Some(item) = items.iter().find(|item| item.qty <= 0) {
        return Err(Error::validation(format!(
            "qty for product {} must be greater than 0",
            item.product_id
        )));
    }

    let txn = ledger.begin_write().await?;
    let db = txn.conn();

    let mut planned: Vec<(ProductionItem, product::Model, Vec<recipe_line::Model>)> =
        Vec::with_capacity(items.len());
    let mut requirements = MaterialRequirements::new();
    for item in items {
        let product = find_product(db, item.product_id).await?;
        let recipe = recipe_for(db, product.id).await?;
        requirements.add_recipe(&recipe, item.qty);
        planned.push((item, product, recipe));
    }
    if let Err(err) = check_requirements(db, &requirements).await {
        warn!(error = %err, "Production batch rejected");
        return Err(err);
    }

    let mut produced = Vec::with_capacity(planned.len());
    for (item, product, recipe) in planned {
        let cause = Cause::new(RefType::Produce, product.id).by(item.operator.as_deref());
        for line in &recipe {
            deduct_material(db, line.material_id, line.grams * f64::from(item.qty), &cause)
                .await?;
        }
        let change = credit_finished_goods(db, product.id, item.qty, &cause).await?;
        produced.push(Produced {
            product_id: product.id,
            qty: item.qty,
            stock: packages(&change),
        });
    }
    txn.commit().await?;

    info!(products = produced.len(), "Production batch committed");
    Ok(produced)
}

/// Removes finished packages found missing or spoiled at stocktake.
#[instrument(skip(ledger))]
pub async fn write_off_finished_goods(
    ledger: &Ledger,
    product_id: i64,
    qty: i32,
    operator: Option<&str>,
) -> Result<Produced> {
    if qty <= 0 {
        return Err(Error::validation("qty must be greater than 0"));
    }

    let txn = ledger.begin_write().await?;
    let product = find_product(txn.conn(), product_id).await?;
    if product.stock < qty {
        return Err(Error::validation(format!(
            "only {} finished packages in stock",
            product.stock
        )));
    }
    let cause = Cause::new(RefType::Adjust, product_id).by(operator);
    let change = deduct_finished_goods(txn.conn(), product_id, qty, &cause).await?;
    txn.commit().await?;

    info!(product_id, qty, "Finished goods written off");
    Ok(Produced {
        product_id,
        qty,
        stock: packages(&change),
    })
}

// Product counters are i32, so the f64 round trip is exact.
#[allow(clippy::cast_possible_truncation)]
fn packages(change: &StockChange) -> i32 {
    change.stock.round() as i32
}
