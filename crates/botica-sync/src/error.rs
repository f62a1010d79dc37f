//! # Sync Error Types
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Availability   │  │   Remote SQL    │  │     Local / Control     │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Offline        │  │  RemoteQuery    │  │  Local (DbError)        │ │
//! │  │  Unavailable    │  │  Decode         │  │  AlreadyRunning         │ │
//! │  │  Timeout        │  │                 │  │  ShuttingDown           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Background tasks log these and drop them. Only the admin paths         │
//! │  (smart sync, reset, bootstrap) return them to a caller.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use botica_db::DbError;
use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// No remote configured, or the initial connection failed.
    #[error("Remote store is offline")]
    Offline,

    /// The remote did not answer the availability probe.
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Remote store did not answer within {0} seconds")]
    Timeout(u64),

    /// A remote statement failed.
    #[error("Remote query failed: {0}")]
    RemoteQuery(String),

    /// A remote row could not be turned into a domain entity.
    #[error("Cannot decode remote {table} row: {reason}")]
    Decode { table: String, reason: String },

    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),

    #[error("Local store error: {0}")]
    Local(#[from] DbError),

    /// A smart sync is already in progress.
    #[error("Smart sync already running")]
    AlreadyRunning,

    #[error("Replication agent is shutting down")]
    ShuttingDown,
}

impl SyncError {
    pub fn decode(table: impl Into<String>, reason: impl ToString) -> Self {
        SyncError::Decode {
            table: table.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the next mutation or smart sync may succeed where this failed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Unavailable(_) | SyncError::Timeout(_) | SyncError::RemoteQuery(_) | SyncError::AlreadyRunning
        )
    }

    /// Errors that the facade reports as `REMOTE_UNAVAILABLE`.
    pub fn is_remote(&self) -> bool {
        !matches!(self, SyncError::Local(_) | SyncError::AlreadyRunning | SyncError::ShuttingDown)
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                SyncError::Unavailable(err.to_string())
            }
            other => SyncError::RemoteQuery(other.to_string()),
        }
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}
