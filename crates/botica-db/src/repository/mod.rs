//! # Repository Module
//!
//! One repository per aggregate, each holding a clone of the pool.
//!
//! ```text
//! Database ──► sellers()   clients()   suppliers()   products()
//!          └─► ledger()    sales()     purchases()   sync_log()
//! ```
//!
//! [`ledger`] also exposes connection-level functions (`record`,
//! `adjust_to`, ...) that the sale, purchase, product and import
//! transactions call while they hold product row locks.

pub mod client;
pub mod ledger;
pub(crate) mod paging;
pub mod product;
pub mod purchase;
pub mod sale;
pub mod seller;
pub mod supplier;
pub mod sync_log;
