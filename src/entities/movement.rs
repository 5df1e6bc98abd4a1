//! Movement entity - The append-only inventory log.
//!
//! Every stock change writes exactly one row. A row touches either one
//! material (grams) or one product (packages); [`Model::item`] exposes that as
//! a tagged [`StockItem`]. Compensations point at the row they undo through
//! `reversal_of`, which is unique, so a movement can be reversed at most once.

use super::enums::{ItemKind, MovementKind, RefType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Movement database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "movements")]
pub struct Model {
    /// Unique identifier for the movement
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Direction of the change
    pub kind: MovementKind,
    /// Which kind of counter changed
    pub item: ItemKind,
    /// Id of the material or product
    pub item_id: i64,
    /// Grams for materials, packages for products; always positive
    pub quantity: f64,
    /// Business cause
    pub ref_type: RefType,
    /// Id of the causing record
    pub ref_id: i64,
    /// Movement this row compensates, if any
    #[sea_orm(unique)]
    pub reversal_of: Option<i64>,
    /// Display name of the operator
    pub operator: Option<String>,
    /// When the movement was written
    pub created_at: DateTimeUtc,
}

/// The counter a movement touches, with its magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StockItem {
    /// Raw material change in grams
    Material {
        /// Material id
        material_id: i64,
        /// Grams moved
        grams: f64,
    },
    /// Finished goods change in packages
    Product {
        /// Product id
        product_id: i64,
        /// Packages moved
        packages: i32,
    },
}

impl StockItem {
    /// Discriminator and id, as stored in the `item`/`item_id` columns.
    #[must_use]
    pub const fn key(&self) -> (ItemKind, i64) {
        match *self {
            Self::Material { material_id, .. } => (ItemKind::Material, material_id),
            Self::Product { product_id, .. } => (ItemKind::Product, product_id),
        }
    }

    /// Magnitude as stored in the `quantity` column.
    #[must_use]
    pub fn quantity(&self) -> f64 {
        match *self {
            Self::Material { grams, .. } => grams,
            Self::Product { packages, .. } => f64::from(packages),
        }
    }
}

impl Model {
    /// Tagged view of the counter this movement touched.
    #[must_use]
    pub fn item(&self) -> StockItem {
        match self.item {
            ItemKind::Material => StockItem::Material {
                material_id: self.item_id,
                grams: self.quantity,
            },
            // Packages are written from an i32, so the round trip is exact.
            #[allow(clippy::cast_possible_truncation)]
            ItemKind::Product => StockItem::Product {
                product_id: self.item_id,
                packages: self.quantity.round() as i32,
            },
        }
    }

    /// Signed effect on the counter: positive for `in`, negative for `out`.
    #[must_use]
    pub fn signed_quantity(&self) -> f64 {
        match self.kind {
            MovementKind::In => self.quantity,
            MovementKind::Out => -self.quantity,
        }
    }
}

/// Movements reference other rows only by id, so there are no relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
