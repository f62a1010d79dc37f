//! # botica-db: Local Store for Botica POS
//!
//! SQLite through sqlx. Owns every local row, the stock ledger and the
//! sale/purchase engine.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  apps/backend facade        botica-sync            botica-import        │
//! │       │                         │                       │               │
//! │       ▼                         ▼                       ▼               │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  botica-db (THIS CRATE)                         │   │
//! │  │                                                                 │   │
//! │  │  pool.rs        Database, DbConfig, Tx, deep_reset              │   │
//! │  │  lock.rs        lock_row, claim_write_lock                      │   │
//! │  │  upsert.rs      build_upsert, bind_all, upsert_local            │   │
//! │  │  mapping.rs     business-key rows and conflict policies         │   │
//! │  │  repository/    sellers ... ledger, sales, purchases, sync_log  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  <data_dir>/botica.db  (WAL)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use botica_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("botica.db")).await?;
//! let page = db.products().paginated(&PageRequest::new(1, 20)).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod lock;
pub mod mapping;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod table;
pub mod timestamp;
pub mod upsert;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, Tx};
pub use table::Table;

pub use repository::client::ClientRepository;
pub use repository::ledger::{LedgerRepository, NewStockOperation, NormalizeReport, StockCorrection};
pub use repository::product::ProductRepository;
pub use repository::purchase::PurchaseRepository;
pub use repository::sale::SaleRepository;
pub use repository::seller::{SellerRecord, SellerRepository};
pub use repository::supplier::SupplierRepository;
pub use repository::sync_log::SyncLogRepository;
