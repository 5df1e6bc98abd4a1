//! Material entity - Raw material counters measured in grams.
//!
//! `stock` is the sole source of truth for available grams and is mutated only
//! by the stock mutator in [`crate::ledger::stock`]. `threshold` is advisory.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Material database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    /// Unique identifier for the material
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g., "Angelica root")
    pub name: String,
    /// Unit of measure, always `"g"`
    pub unit: String,
    /// Grams currently in stock, never negative
    pub stock: f64,
    /// Low-stock warning level in grams
    pub threshold: f64,
}

/// Defines relationships between Material and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A material is used by many recipe lines
    #[sea_orm(has_many = "super::recipe_line::Entity")]
    RecipeLines,
    /// A material has many purchases
    #[sea_orm(has_many = "super::purchase::Entity")]
    Purchases,
}

impl Related<super::recipe_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecipeLines.def()
    }
}

impl Related<super::purchase::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Purchases.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
