//! # botica-sync: Remote Store and Replication for Botica POS
//!
//! Keeps a shared SQL database in step with the local store. The local store
//! is always authoritative for the till; the remote store is best effort and
//! the application never waits on it.
//!
//! ## Replication Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   startup                                                               │
//! │     RemoteStore::connect(DATABASE_URL)  ── fails ──► offline for good   │
//! │     agent.spawn_reconcile()             ── push all / pull all / none   │
//! │                                                                         │
//! │   every committed mutation                                              │
//! │     agent.push_*()  ── tracked tokio task, upsert by business key       │
//! │     agent.synchronize_ledger() after sales and purchases                │
//! │                                                                         │
//! │   on demand                                                             │
//! │     agent.smart_sync()  ── watermark pull + push, last writer wins      │
//! │                                                                         │
//! │   shutdown                                                              │
//! │     agent.shutdown()    ── cancel, wait, close                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`remote`] - `RemoteStore`: `AnyPool`, availability probe, remote upsert
//! - [`schema`] - Remote DDL for postgres and sqlite
//! - [`rows`] - `AnyRow` decoding and remote fetches
//! - [`mapping`] - Rows whose foreign ids resolve by business key
//! - [`push`] - `Pusher`: incremental pushes and `synchronize_ledger`
//! - [`transfer`] - Bulk pull/push per model, invoices and ledger pulls
//! - [`reconcile`] - Startup reconciliation
//! - [`smart`] - Smart sync
//! - [`agent`] - `ReplicationAgent`: background tasks and status
//! - [`error`] - `SyncError`

pub mod agent;
pub mod error;
pub mod mapping;
pub mod push;
pub mod reconcile;
pub mod remote;
pub mod rows;
pub mod schema;
pub mod smart;
pub mod transfer;

pub use agent::{ReplicationAgent, ReplicationStatus};
pub use error::{SyncError, SyncResult};
pub use push::Pusher;
pub use reconcile::{ReconcileAction, ReconcileReport};
pub use remote::{RemoteStore, DEFAULT_PING_TIMEOUT};
pub use smart::{SmartSync, SmartSyncReport};
