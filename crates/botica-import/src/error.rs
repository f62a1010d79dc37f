//! # Import Error Types
//!
//! Only failures that stop an import before it starts, or break the
//! pipeline itself, surface here. Bad rows and failed batches are recorded
//! in the `ImportLog` and the import carries on.

use std::path::PathBuf;

use botica_db::DbError;
use thiserror::Error;

pub type ImportResult<T> = Result<T, ImportError>;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Unknown import target '{0}' (expected Products or Clients)")]
    UnknownTarget(String),

    #[error("Cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Header row lacks columns the target needs.
    #[error("{target} CSV is missing headers: {}", .missing.join(", "))]
    MissingHeaders { target: String, missing: Vec<String> },

    #[error("Local store error: {0}")]
    Store(#[from] DbError),

    /// A pipeline task panicked or was cancelled.
    #[error("Import pipeline failed: {0}")]
    Pipeline(String),
}

impl From<tokio::task::JoinError> for ImportError {
    fn from(err: tokio::task::JoinError) -> Self {
        ImportError::Pipeline(err.to_string())
    }
}
