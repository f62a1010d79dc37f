//! # API Error Type
//!
//! Unified error type for the facade.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ValidationError / CoreError ─┐                                        │
//! │  DbError ─────────────────────┤                                        │
//! │  SyncError ───────────────────┼──► ApiError { code, message } ──► GUI  │
//! │  ImportError ─────────────────┤                                        │
//! │  AuthError / ConfigError ─────┘                                        │
//! │                                                                         │
//! │  Store internals are logged and replaced by a generic message.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serialization
//! ```json
//! { "code": "STOCK_INSUFFICIENT", "message": "Insufficient stock for A: available 5, requested 6" }
//! ```

use botica_core::{CoreError, ValidationError};
use botica_db::DbError;
use botica_import::ImportError;
use botica_sync::SyncError;
use serde::Serialize;

use crate::auth::AuthError;
use crate::config::ConfigError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    DuplicateKey,
    StockInsufficient,
    Validation,
    AuthFailed,
    /// The local store cannot be reached. Not recoverable by the caller.
    StoreUnavailable,
    RemoteUnavailable,
    /// Reported inside import summaries; batches that fail do not stop the
    /// import.
    ImportBatchFailed,
    Internal,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Validation, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", entity, id)),
            DbError::UniqueViolation { field, value } => {
                ApiError::new(ErrorCode::DuplicateKey, format!("{} '{}' already exists", field, value))
            }
            err @ DbError::InsufficientStock { .. } => ApiError::new(ErrorCode::StockInsufficient, err.to_string()),
            DbError::Validation(e) => ApiError::validation(e.to_string()),
            DbError::Rule(message) => ApiError::validation(message),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!(%message, "Foreign key violation");
                ApiError::validation("Invalid reference")
            }
            err @ (DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::PoolExhausted
            | DbError::TransactionFailed(_)) => {
                tracing::error!(error = %err, "Local store unavailable");
                ApiError::new(ErrorCode::StoreUnavailable, "Local store unavailable")
            }
            DbError::QueryFailed(e) | DbError::Internal(e) => {
                tracing::error!(error = %e, "Local store operation failed");
                ApiError::internal("Database operation failed")
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        DbError::from(err).into()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Local(db) => db.into(),
            SyncError::ShuttingDown => ApiError::internal(err.to_string()),
            other => ApiError::new(ErrorCode::RemoteUnavailable, other.to_string()),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Store(db) => db.into(),
            ImportError::Pipeline(e) => {
                tracing::error!(error = %e, "Import pipeline failed");
                ApiError::internal("Import pipeline failed")
            }
            other => ApiError::validation(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Hashing(_) | AuthError::Signing(_) => {
                tracing::error!(error = %err, "Auth internals failed");
                ApiError::internal("Authentication service failed")
            }
            other => ApiError::new(ErrorCode::AuthFailed, other.to_string()),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::validation(err.to_string())
    }
}
