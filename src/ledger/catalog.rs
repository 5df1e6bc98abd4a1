//! Catalog business logic - Creating and reading materials and products.
//!
//! Catalog records are created here with zero stock. From then on their stock
//! counters change only through the stock mutator; this module never touches
//! them.

use crate::{
    entities::{Material, Product, material, product, recipe_line},
    errors::{Error, Result},
    ledger::{
        Ledger,
        movement::normalize_grams,
        store::{find_material, find_product, recipe_for},
    },
};
use sea_orm::{QueryOrder, Set, prelude::*};
use std::collections::HashSet;
use tracing::{info, instrument};

/// Unit every material is measured in.
pub const MATERIAL_UNIT: &str = "g";

/// Input for [`create_product`].
#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    /// Display name
    pub name: String,
    /// Base price per package
    pub price_base: f64,
    /// `(material_id, grams per unit)` pairs
    pub recipe: Vec<(i64, f64)>,
    /// Low-stock warning level in packages
    pub threshold: i32,
}

/// Creates a material with zero stock.
#[instrument(skip(ledger))]
pub async fn create_material(
    ledger: &Ledger,
    name: &str,
    threshold: f64,
) -> Result<material::Model> {
    let name = validate_name(name)?;
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(Error::validation("threshold must be non-negative"));
    }

    let txn = ledger.begin_write().await?;
    let created = material::ActiveModel {
        name: Set(name),
        unit: Set(MATERIAL_UNIT.to_string()),
        stock: Set(0.0),
        threshold: Set(threshold),
        ..Default::default()
    }
    .insert(txn.conn())
    .await?;
    txn.commit().await?;

    info!(material_id = created.id, name = %created.name, "Material created");
    Ok(created)
}

/// Creates a product and its recipe with zero finished stock.
///
/// Every recipe line must reference an existing material with positive grams,
/// and a material may appear only once.
#[instrument(skip(ledger, new), fields(name = %new.name))]
pub async fn create_product(ledger: &Ledger, new: NewProduct) -> Result<product::Model> {
    let name = validate_name(&new.name)?;
    if !new.price_base.is_finite() || new.price_base < 0.0 {
        return Err(Error::validation("base price must be non-negative"));
    }
    if new.threshold < 0 {
        return Err(Error::validation("threshold must be non-negative"));
    }

    let mut seen = HashSet::new();
    let mut recipe = Vec::with_capacity(new.recipe.len());
    for &(material_id, grams) in &new.recipe {
        recipe.push((material_id, normalize_grams("recipe grams", grams)?));
        if !seen.insert(material_id) {
            return Err(Error::validation(format!(
                "material {material_id} appears twice in the recipe"
            )));
        }
    }

    let txn = ledger.begin_write().await?;
    for &(material_id, _) in &recipe {
        find_material(txn.conn(), material_id).await?;
    }

    let created = product::ActiveModel {
        name: Set(name),
        price_base: Set(new.price_base),
        stock: Set(0),
        threshold: Set(new.threshold),
        ..Default::default()
    }
    .insert(txn.conn())
    .await?;

    for (material_id, grams) in recipe {
        recipe_line::ActiveModel {
            product_id: Set(created.id),
            material_id: Set(material_id),
            grams: Set(grams),
            ..Default::default()
        }
        .insert(txn.conn())
        .await?;
    }
    txn.commit().await?;

    info!(product_id = created.id, "Product created");
    Ok(created)
}

/// All materials ordered by id.
pub async fn list_materials(ledger: &Ledger) -> Result<Vec<material::Model>> {
    Material::find()
        .order_by_asc(material::Column::Id)
        .all(ledger.db())
        .await
        .map_err(Into::into)
}

/// All products ordered by id.
pub async fn list_products(ledger: &Ledger) -> Result<Vec<product::Model>> {
    Product::find()
        .order_by_asc(product::Column::Id)
        .all(ledger.db())
        .await
        .map_err(Into::into)
}

/// Recipe of an existing product.
pub async fn get_recipe(ledger: &Ledger, product_id: i64) -> Result<Vec<recipe_line::Model>> {
    find_product(ledger.db(), product_id).await?;
    recipe_for(ledger.db(), product_id).await
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(Error::validation("name must not be empty"))
    } else {
        Ok(trimmed.to_string())
    }
}
