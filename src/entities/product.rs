//! Product entity - Sellable products and their finished-goods counter.
//!
//! `stock` counts pre-produced packages that can be sold without touching raw
//! materials. The recipe lives in [`super::recipe_line`].

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Base price per package before discounts
    pub price_base: f64,
    /// Finished packages in stock, never negative
    #[serde(default)]
    pub stock: i32,
    /// Low-stock warning level in packages
    #[serde(default)]
    pub threshold: i32,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One product has many recipe lines
    #[sea_orm(has_many = "super::recipe_line::Entity")]
    RecipeLines,
    /// One product has many orders
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::recipe_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecipeLines.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
