//! Read-only reports over the ledger.

use crate::{
    entities::{Material, Order, Product, material, order, product},
    errors::Result,
    ledger::{Ledger, store::find_product},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, prelude::*, sea_query::Expr};
use serde::Serialize;

/// Number of recent orders returned by [`product_usage`].
pub const RECENT_ORDERS: usize = 20;

/// Items at or below their advisory threshold.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LowStockReport {
    /// Materials running low
    pub materials: Vec<material::Model>,
    /// Products whose finished stock is running low
    pub products: Vec<product::Model>,
}

impl LowStockReport {
    /// True when nothing is running low.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty() && self.products.is_empty()
    }
}

/// Summary line for one order in [`ProductUsage`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentOrder {
    /// Order id
    pub id: i64,
    /// Packages sold
    pub qty: i32,
    /// Amount receivable
    pub receivable: f64,
    /// Commit time
    pub created_at: DateTime<Utc>,
}

/// How much a product has been sold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductUsage {
    /// Number of orders
    pub count: u64,
    /// Packages sold across all orders
    pub total_qty: i64,
    /// Most recent orders, newest first
    pub recent: Vec<RecentOrder>,
}

/// Materials and products whose stock is at or below their threshold.
///
/// Products without a threshold are never reported.
pub async fn low_stock(ledger: &Ledger) -> Result<LowStockReport> {
    let materials = Material::find()
        .filter(Expr::col(material::Column::Stock).lte(Expr::col(material::Column::Threshold)))
        .order_by_asc(material::Column::Id)
        .all(ledger.db())
        .await?;
    let products = Product::find()
        .filter(product::Column::Threshold.gt(0))
        .filter(Expr::col(product::Column::Stock).lte(Expr::col(product::Column::Threshold)))
        .order_by_asc(product::Column::Id)
        .all(ledger.db())
        .await?;
    Ok(LowStockReport {
        materials,
        products,
    })
}

/// Order count, packages sold and the latest orders of one product.
pub async fn product_usage(ledger: &Ledger, product_id: i64) -> Result<ProductUsage> {
    find_product(ledger.db(), product_id).await?;
    let orders = Order::find()
        .filter(order::Column::ProductId.eq(product_id))
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(ledger.db())
        .await?;

    Ok(ProductUsage {
        count: orders.len() as u64,
        total_qty: orders.iter().map(|o| i64::from(o.qty)).sum(),
        recent: orders
            .into_iter()
            .take(RECENT_ORDERS)
            .map(|o| RecentOrder {
                id: o.id,
                qty: o.qty,
                receivable: o.receivable,
                created_at: o.created_at,
            })
            .collect(),
    })
}
