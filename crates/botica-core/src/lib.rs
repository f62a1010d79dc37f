//! # botica-core: Pure Domain Logic for Botica POS
//!
//! Entities, money, invoice arithmetic and validation for the pharmacy
//! backend. No I/O: the store, replication and import crates build on top.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               apps/backend  (facade, auth, CLI)                 │   │
//! │  └──────────────┬──────────────────────┬───────────────────────────┘   │
//! │                 │                      │                                │
//! │  ┌──────────────▼──────────┐  ┌────────▼──────────┐                    │
//! │  │ botica-sync / -import   │  │    botica-db      │                    │
//! │  └──────────────┬──────────┘  └────────┬──────────┘                    │
//! │                 │                      │                                │
//! │  ┌──────────────▼──────────────────────▼───────────────────────────┐   │
//! │  │               ★ botica-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   entity      money      invoice      validation     request   │   │
//! │  │   Seller      Money      FAC-<n>      required       SaleRequest│   │
//! │  │   Product     TaxRate    totals       email, stock   ...       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust
//! use botica_core::invoice::TotalsAccumulator;
//! use botica_core::{Money, TaxRate};
//!
//! let mut totals = TotalsAccumulator::new();
//! totals.add_line(2, Money::from_cents(100))?;
//! let totals = totals.finish(TaxRate::zero())?;
//! assert_eq!(totals.total.cents(), 200);
//! # Ok::<(), botica_core::ValidationError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod entity;
pub mod error;
pub mod invoice;
pub mod money;
pub mod request;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use entity::*;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use request::*;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Seller that owns INITIAL and PURCHASE ledger entries.
///
/// Seeded by the local migrations with an unusable password hash.
pub const SYSTEM_SELLER_ID: i64 = 1;

/// Business key of the system seller in both stores.
pub const SYSTEM_SELLER_NATIONAL_ID: &str = "SYSTEM";

pub const INVOICE_PREFIX: &str = "FAC-";

/// Number of the first invoice of an empty store.
pub const FIRST_INVOICE_NUMBER: i64 = 1001;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 200;
