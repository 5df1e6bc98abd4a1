//! `stock-ledger` - Inventory and order ledger for a small production workshop
//!
//! This crate tracks raw-material and finished-goods stock, records every stock
//! change in an append-only movement log, and provides order, production and
//! reversal workflows that validate everything before mutating anything.

#![deny(
    unsafe_code,
    unreachable_code,
    unreachable_patterns,
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links,
)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    // Stock quantities are floats; compare with a tolerance
    clippy::float_cmp,
    // Errors propagate through `Result`
    clippy::expect_used,
    clippy::panic,
    clippy::unwrap_used,
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro,
    clippy::exit,
    clippy::todo,
    clippy::unimplemented,
    clippy::needless_pass_by_value,
    clippy::large_types_passed_by_value,
    clippy::redundant_closure_for_method_calls,
    clippy::semicolon_if_nothing_returned,
    future_incompatible,
    rust_2018_idioms,
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

/// Configuration management for database and pricing settings
pub mod config;
/// SeaORM entity definitions for database tables
pub mod entities;
/// Unified error types and result handling
pub mod errors;
/// Core ledger logic - stock mutation, movement log and business workflows
pub mod ledger;

#[cfg(test)]
pub mod test_utils;
