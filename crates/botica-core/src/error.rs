//! # Error Types
//!
//! Domain errors for botica-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  botica-core (this file)                                               │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input shape failures                           │
//! │                                                                         │
//! │  botica-db            DbError      (local store)                       │
//! │  botica-sync          SyncError    (remote store, replication)         │
//! │  botica-import        ImportError  (CSV pipeline)                      │
//! │  apps/backend         ApiError     (code + message for the GUI)        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError/DbError → ApiError → GUI            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations detected without touching storage.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Requested more units than the product has.
    ///
    /// ## When This Occurs
    /// ```text
    /// SaleLine { product: "AMOX-500", quantity: 5 }
    ///      │
    ///      ▼
    /// fold(ledger) = 3
    ///      │
    ///      ▼
    /// InsufficientStock { code: "AMOX-500", available: 3, requested: 5 }
    /// ```
    #[error("Insufficient stock for {code}: available {available}, requested {requested}")]
    InsufficientStock {
        code: String,
        available: i64,
        requested: i64,
    },

    /// A stock operation would leave a product below zero.
    #[error("Stock for product {product_id} would become negative ({resulting})")]
    NegativeStock { product_id: i64, resulting: i64 },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before any transaction opens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (non-numeric price, malformed email...).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// A quantity or amount too large to store.
    #[error("{field} is out of range")]
    OutOfRange { field: String },

    /// Collection must not be empty (sale or purchase without lines).
    #[error("{field} must contain at least one item")]
    Empty { field: String },
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::MustBePositive { field }
            | ValidationError::MustNotBeNegative { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::NotAllowed { field, .. }
            | ValidationError::OutOfRange { field }
            | ValidationError::Empty { field } => field,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
