/// Database connection and table creation
pub mod database;

/// Pricing discount table loading from pricing.toml
pub mod pricing;
