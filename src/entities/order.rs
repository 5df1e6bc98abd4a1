//! Order entity - A committed sale.
//!
//! `used_finished` records how many of `qty` were served from finished goods;
//! the remaining `qty - used_finished` units consumed raw materials by recipe.
//! Cancellation relies on this split to credit the right counters back.

use super::enums::{OrderType, Payment, PricingGroup};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Kind of sale
    pub order_type: OrderType,
    /// Product sold
    pub product_id: i64,
    /// Packages sold, always positive
    pub qty: i32,
    /// Packages served from finished goods, `None` when zero
    pub used_finished: Option<i32>,
    /// Person picking up the order
    pub person: String,
    /// Amount receivable as persisted (after any manual override)
    pub receivable: f64,
    /// Payment channel, if recorded
    pub payment: Option<Payment>,
    /// When the order was committed
    pub created_at: DateTimeUtc,
    /// Pricing group chosen at checkout
    pub pricing_group: Option<PricingGroup>,
    /// Pricing plan chosen at checkout
    pub pricing_plan_id: Option<String>,
    /// Resolved unit price
    pub per_pack_price: Option<f64>,
    /// Free-form note
    pub remark: Option<String>,
    /// Price the engine computed, kept only when an override replaced it
    pub computed_receivable: Option<f64>,
    /// Why the receivable was overridden
    pub override_reason: Option<String>,
}

impl Model {
    /// Packages served from finished goods.
    #[must_use]
    pub fn finished_units(&self) -> i32 {
        self.used_finished.unwrap_or(0)
    }

    /// Packages whose material cost was deducted by recipe.
    #[must_use]
    pub fn raw_units(&self) -> i32 {
        self.qty - self.finished_units()
    }
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each order sells one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
