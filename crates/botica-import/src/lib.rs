//! # botica-import: Bulk CSV Ingestion
//!
//! Producer, validator pool and a single batching collector, wired with
//! tokio channels.
//!
//! ## Usage
//! ```rust,ignore
//! use botica_import::{import_csv, ImportTarget};
//!
//! let (summary, mut progress) = import_csv(&db, "productos.csv", ImportTarget::Products).await?;
//! while let Ok(line) = progress.try_recv() {
//!     println!("{line}");
//! }
//! println!("{} of {} rows imported", summary.successful_rows, summary.total_rows);
//! ```
//!
//! ## Module Organization
//! - [`target`] - `ImportTarget` and its required headers
//! - [`mapper`] - Raw row to typed record
//! - [`log`] - `ImportLog`: thread-safe counters and bounded error list
//! - [`pipeline`] - `start_import` / `import_csv`
//! - [`error`] - `ImportError`

pub mod error;
pub mod log;
pub mod mapper;
pub mod pipeline;
pub mod target;

pub use error::{ImportError, ImportResult};
pub use log::{ImportLog, ImportSummary, MAX_RECORDED_ERRORS};
pub use pipeline::{import_csv, start_import, ImportHandle, BATCH_SIZE, WORKERS};
pub use target::ImportTarget;
