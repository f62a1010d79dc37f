//! # Botica Backend
//!
//! Backend of the Botica pharmacy point of sale. The GUI shell holds one
//! [`Backend`] and calls its facade methods; every call returns
//! `Result<T, ApiError>` with a stable error code.
//!
//! ## Module Organization
//! ```text
//! botica_backend/
//! ├── lib.rs          ◄─── You are here (exports)
//! ├── backend.rs      ◄─── Composition root, startup, shutdown
//! ├── config.rs       ◄─── Environment configuration
//! ├── auth.rs         ◄─── Password hashing and tokens
//! ├── error.rs        ◄─── ApiError and error codes
//! ├── telemetry.rs    ◄─── Tracing subscriber
//! └── services/
//!     ├── sellers.rs  ◄─── Sellers, profile, login
//!     ├── catalog.rs  ◄─── Clients, suppliers, products, stock
//!     ├── sales.rs    ◄─── Sales and purchases
//!     └── admin.rs    ◄─── Normalize, reset, import, smart sync
//! ```
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  facade call ──► local Tx commit ──► Ok(result) to the caller           │
//! │                        │                                                │
//! │                        └──► agent.push_*() (background, best effort)    │
//! │                                   │                                     │
//! │                                   └──► remote upsert when online        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod services;
pub mod telemetry;

pub use auth::{Claims, LoginOutcome};
pub use backend::Backend;
pub use config::{AppConfig, ConfigError};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use services::ResetReport;
pub use telemetry::init_tracing;
