//! Core ledger logic - framework-agnostic stock, order and reversal workflows.
//!
//! Workflows are async functions taking a [`Ledger`]. Mutating workflows run
//! "validate everything, then mutate everything" inside one write transaction;
//! read-only queries use the connection directly.

/// Backup snapshot and restore
pub mod backup;
/// Catalog reads and record creation for materials and products
pub mod catalog;
/// Movement log append, query and replay
pub mod movement;
/// Order workflow: quote, commit, list
pub mod order;
/// Pricing resolver seam and the default discount table
pub mod pricing;
/// Batch production and finished-goods write-offs
pub mod production;
/// Material inbound
pub mod purchase;
/// Read-only reports: low stock, product usage
pub mod report;
/// Order cancellation, purchase revocation and generic movement reversal
pub mod reversal;
/// Stock mutator primitives and requirement checks
pub mod stock;
/// Ledger handle, writer lock and record lookups
pub mod store;

pub use store::{Ledger, WriteTxn};

/// Rounds to two decimals, the precision of every persisted amount.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(10.0 / 3.0), 3.33);
        assert_eq!(round2(0.1 + 0.2), 0.3);
        assert_eq!(round2(12.0), 12.0);
        assert_eq!(round2(1.999), 2.0);
    }
}
