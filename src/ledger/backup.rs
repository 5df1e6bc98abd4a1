//! Backup and restore of the whole ledger.
//!
//! A [`LedgerSnapshot`] holds every table and serialises to JSON. Restoring
//! replaces the current state entirely; the snapshot is validated first and
//! refused if it would break a ledger invariant.

use crate::{
    entities::{
        Material, Movement, Order, Product, Purchase, RecipeLine, material, movement, order,
        product, purchase, recipe_line,
    },
    errors::{Error, Result},
    ledger::Ledger,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ConnectionTrait, EntityTrait, IntoActiveModel,
    QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path};
use tracing::{info, instrument};

/// Snapshot layout version written by this crate.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Every table of the ledger at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Layout version
    pub format_version: u32,
    /// When the snapshot was taken
    pub exported_at: DateTime<Utc>,
    /// Materials
    pub materials: Vec<material::Model>,
    /// Products
    pub products: Vec<product::Model>,
    /// Recipe lines
    pub recipe_lines: Vec<recipe_line::Model>,
    /// Purchases
    pub purchases: Vec<purchase::Model>,
    /// Orders
    pub orders: Vec<order::Model>,
    /// Movement log
    pub movements: Vec<movement::Model>,
}

impl LedgerSnapshot {
    /// Checks the invariants a restored ledger must satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(Error::validation(format!(
                "unsupported snapshot format version {}",
                self.format_version
            )));
        }

        let mut material_ids = HashSet::new();
        for m in &self.materials {
            if !m.stock.is_finite() || m.stock < 0.0 {
                return Err(Error::validation(format!(
                    "material {} has negative stock",
                    m.id
                )));
            }
            if !material_ids.insert(m.id) {
                return Err(Error::validation(format!("duplicate material id {}", m.id)));
            }
        }

        let mut product_ids = HashSet::new();
        for p in &self.products {
            if p.stock < 0 {
                return Err(Error::validation(format!(
                    "product {} has negative stock",
                    p.id
                )));
            }
            if !product_ids.insert(p.id) {
                return Err(Error::validation(format!("duplicate product id {}", p.id)));
            }
        }

        for line in &self.recipe_lines {
            if !(line.grams.is_finite() && line.grams > 0.0) {
                return Err(Error::validation(format!(
                    "recipe line {} has non-positive grams",
                    line.id
                )));
            }
            if !product_ids.contains(&line.product_id)
                || !material_ids.contains(&line.material_id)
            {
                return Err(Error::validation(format!(
                    "recipe line {} references a missing record",
                    line.id
                )));
            }
        }

        for p in &self.purchases {
            if !material_ids.contains(&p.material_id) {
                return Err(Error::validation(format!(
                    "purchase {} references missing material {}",
                    p.id, p.material_id
                )));
            }
        }

        for o in &self.orders {
            let used = o.finished_units();
            if o.qty <= 0 || used < 0 || used > o.qty {
                return Err(Error::validation(format!(
                    "order {} has an invalid finished-goods split",
                    o.id
                )));
            }
            if !product_ids.contains(&o.product_id) {
                return Err(Error::validation(format!(
                    "order {} references missing product {}",
                    o.id, o.product_id
                )));
            }
        }
        Ok(())
    }
}

/// Reads every table into a snapshot.
#[instrument(skip(ledger))]
pub async fn snapshot(ledger: &Ledger) -> Result<LedgerSnapshot> {
    let db = ledger.db();
    let snapshot = LedgerSnapshot {
        format_version: SNAPSHOT_FORMAT_VERSION,
        exported_at: Utc::now(),
        materials: Material::find()
            .order_by_asc(material::Column::Id)
            .all(db)
            .await?,
        products: Product::find()
            .order_by_asc(product::Column::Id)
            .all(db)
            .await?,
        recipe_lines: RecipeLine::find()
            .order_by_asc(recipe_line::Column::Id)
            .all(db)
            .await?,
        purchases: Purchase::find()
            .order_by_asc(purchase::Column::Id)
            .all(db)
            .await?,
        orders: Order::find().order_by_asc(order::Column::Id).all(db).await?,
        movements: Movement::find()
            .order_by_asc(movement::Column::Id)
            .all(db)
            .await?,
    };
    info!(
        materials = snapshot.materials.len(),
        movements = snapshot.movements.len(),
        "Snapshot taken"
    );
    Ok(snapshot)
}

/// Replaces the whole ledger with `snapshot`.
///
/// Nothing is deleted unless the snapshot validates.
#[instrument(skip(ledger, snapshot))]
pub async fn restore(ledger: &Ledger, snapshot: LedgerSnapshot) -> Result<()> {
    snapshot.validate()?;

    let txn = ledger.begin_write().await?;
    let db = txn.conn();

    // Children first so foreign keys never dangle.
    Movement::delete_many().exec(db).await?;
    Order::delete_many().exec(db).await?;
    Purchase::delete_many().exec(db).await?;
    RecipeLine::delete_many().exec(db).await?;
    Product::delete_many().exec(db).await?;
    Material::delete_many().exec(db).await?;

    insert_all(db, snapshot.materials.into_iter().map(material::ActiveModel::from)).await?;
    insert_all(db, snapshot.products.into_iter().map(product::ActiveModel::from)).await?;
    insert_all(
        db,
        snapshot
            .recipe_lines
            .into_iter()
            .map(recipe_line::ActiveModel::from),
    )
    .await?;
    insert_all(db, snapshot.purchases.into_iter().map(purchase::ActiveModel::from)).await?;
    insert_all(db, snapshot.orders.into_iter().map(order::ActiveModel::from)).await?;
    insert_all(db, snapshot.movements.into_iter().map(movement::ActiveModel::from)).await?;
    txn.commit().await?;

    info!(exported_at = %snapshot.exported_at, "Ledger restored from snapshot");
    Ok(())
}

// Rows keep their ids, so later inserts continue after the restored maximum.
async fn insert_all<C, A>(db: &C, rows: impl IntoIterator<Item = A>) -> Result<()>
where
    C: ConnectionTrait,
    A: ActiveModelTrait + ActiveModelBehavior + Send + 'static,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    for row in rows {
        row.reset_all().insert(db).await?;
    }
    Ok(())
}

/// Writes a snapshot to `path` as pretty-printed JSON.
pub fn write_snapshot<P: AsRef<Path>>(path: P, snapshot: &LedgerSnapshot) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(snapshot)?)?;
    info!("Snapshot written to {:?}", path);
    Ok(())
}

/// Reads a snapshot written by [`write_snapshot`].
pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<LedgerSnapshot> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
