//! Ledger store - The shared handle every workflow goes through.
//!
//! The store owns the database connection and a single global write lock.
//! A mutating workflow calls [`Ledger::begin_write`], which takes the lock and
//! opens one database transaction; validation and mutation both run inside
//! that span, so no other writer can invalidate a check between the two.
//! Dropping a [`WriteTxn`] without committing rolls every change back.
//!
//! Readers go straight to [`Ledger::db`] and only ever see committed state.

use crate::{
    entities::{
        Material, Movement, Order, Product, Purchase, RecipeLine, material, movement, order,
        product, purchase, recipe_line,
    },
    errors::{Error, Result},
    ledger::pricing::{DiscountTable, PricingResolver},
};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, QueryOrder, TransactionTrait,
    prelude::*,
};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Handle to the ledger: database connection, writer lock and pricing.
pub struct Ledger {
    db: DatabaseConnection,
    write_lock: Mutex<()>,
    pricing: Arc<dyn PricingResolver>,
}

impl Ledger {
    /// Creates a ledger over an existing connection with default pricing.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_pricing(db, Arc::new(DiscountTable::default()))
    }

    /// Creates a ledger with an explicit pricing resolver.
    #[must_use]
    pub fn with_pricing(db: DatabaseConnection, pricing: Arc<dyn PricingResolver>) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
            pricing,
        }
    }

    /// Connection for read-only queries.
    #[must_use]
    pub const fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Pricing resolver consulted by the order workflow.
    #[must_use]
    pub fn pricing(&self) -> &dyn PricingResolver {
        self.pricing.as_ref()
    }

    /// Takes the writer lock and opens a database transaction.
    pub async fn begin_write(&self) -> Result<WriteTxn<'_>> {
        let guard = self.write_lock.lock().await;
        debug!("Writer lock acquired");
        let txn = self.db.begin().await?;
        Ok(WriteTxn { txn, _guard: guard })
    }
}

/// An open write transaction holding the global writer lock.
///
/// Field order matters: the transaction is dropped (rolled back) before the
/// lock is released.
pub struct WriteTxn<'a> {
    txn: DatabaseTransaction,
    _guard: MutexGuard<'a, ()>,
}

impl WriteTxn<'_> {
    /// Connection to run statements on inside this transaction.
    #[must_use]
    pub const fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Commits every change made through [`Self::conn`] and releases the lock.
    pub async fn commit(self) -> Result<()> {
        self.txn.commit().await?;
        debug!("Write transaction committed");
        Ok(())
    }
}

/// Loads a material or fails with `NotFound`.
pub async fn find_material<C>(db: &C, material_id: i64) -> Result<material::Model>
where
    C: ConnectionTrait,
{
    Material::find_by_id(material_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("material", material_id))
}

/// Loads a product or fails with `NotFound`.
pub async fn find_product<C>(db: &C, product_id: i64) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("product", product_id))
}

/// Loads an order or fails with `NotFound`.
pub async fn find_order<C>(db: &C, order_id: i64) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("order", order_id))
}

/// Loads a purchase or fails with `NotFound`.
pub async fn find_purchase<C>(db: &C, purchase_id: i64) -> Result<purchase::Model>
where
    C: ConnectionTrait,
{
    Purchase::find_by_id(purchase_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("purchase", purchase_id))
}

/// Loads a movement or fails with `NotFound`.
pub async fn find_movement<C>(db: &C, movement_id: i64) -> Result<movement::Model>
where
    C: ConnectionTrait,
{
    Movement::find_by_id(movement_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("movement", movement_id))
}

/// Recipe lines of a product, in insertion order.
pub async fn recipe_for<C>(db: &C, product_id: i64) -> Result<Vec<recipe_line::Model>>
where
    C: ConnectionTrait,
{
    RecipeLine::find()
        .filter(recipe_line::Column::ProductId.eq(product_id))
        .order_by_asc(recipe_line::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
