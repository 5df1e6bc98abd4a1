//! Entity module - Contains all SeaORM entity definitions for the ledger.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod enums;
pub mod material;
pub mod movement;
pub mod order;
pub mod product;
pub mod purchase;
pub mod recipe_line;

// Re-export specific types to avoid conflicts
pub use enums::{ItemKind, MovementKind, OrderType, Payment, PricingGroup, RefType};
pub use material::{Column as MaterialColumn, Entity as Material, Model as MaterialModel};
pub use movement::{Column as MovementColumn, Entity as Movement, Model as MovementModel, StockItem};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use purchase::{Column as PurchaseColumn, Entity as Purchase, Model as PurchaseModel};
pub use recipe_line::{
    Column as RecipeLineColumn, Entity as RecipeLine, Model as RecipeLineModel,
};
