//! Unified error types for the ledger.
//!
//! Every failure a caller can see maps onto exactly one [`ErrorKind`], so a
//! front end can render "ingredients ran out" differently from "this order is
//! too old to cancel" without parsing messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One material (or product) that cannot cover a requested quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortage {
    /// Id of the material or product that is short
    pub id: i64,
    /// Quantity the operation needs
    pub need: f64,
    /// Quantity currently in stock
    pub stock: f64,
}

/// The four failure classes exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A referenced record does not exist
    NotFound,
    /// Malformed input or a rejected business rule
    Validation,
    /// Stock cannot cover the request; carries every shortage
    InsufficientStock,
    /// Storage or configuration failure; details stay server-side
    Internal,
}

/// Ledger error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Referenced entity is missing
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity name, e.g. `"material"`
        entity: &'static str,
        /// Id that was looked up
        id: String,
    },

    /// Input or business rule violation
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable reason
        message: String,
    },

    /// Stock cannot cover the request
    #[error("Insufficient stock for {} item(s)", shortages.len())]
    InsufficientStock {
        /// Complete list of shortages, never just the first
        shortages: Vec<Shortage>,
    },

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// Unexpected internal condition
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the problem
        message: String,
    },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Classifies this error into one of the caller-visible kinds.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            Self::Config { .. }
            | Self::Internal { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_) => ErrorKind::Internal,
        }
    }

    /// Message suitable for showing to an end user.
    ///
    /// Internal failures are logged here with full context and replaced by an
    /// opaque text.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => {
                tracing::error!(error = ?self, "internal ledger failure");
                "Something went wrong, please try again later".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
