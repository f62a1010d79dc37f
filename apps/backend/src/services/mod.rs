//! # Facade
//!
//! Every operation the GUI shell calls. Each one commits locally first and
//! then triggers its replication push in the background; a push failure
//! never reaches the caller.
//!
//! | Module   | Operations                                                  |
//! |----------|-------------------------------------------------------------|
//! | sellers  | register/update/delete/list sellers, profile, login, tokens |
//! | catalog  | clients, suppliers, products, stock history and adjustments |
//! | sales    | sales, invoices, purchases                                  |
//! | admin    | normalize, reset, CSV import, smart sync, status            |

mod admin;
mod catalog;
mod sales;
mod sellers;

pub use admin::ResetReport;
