//! # Smart Sync
//!
//! Two-way catch-up between the stores, driven by per-model watermarks.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  for model in sellers, clients, suppliers, products:                    │
//! │      since = sync_log[model]          (None on the first run)           │
//! │      pull  remote rows updated > since    ── last writer wins locally   │
//! │      push  local rows in (since, start]   ── last writer wins remotely  │
//! │            (skipped on the first run)                                   │
//! │      sync_log[model] = start                                            │
//! │                                                                         │
//! │  pull unknown invoices, pull unknown ledger entries                     │
//! │  synchronize_ledger()                                                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One run at a time: a second caller gets `SyncError::AlreadyRunning`
//! instead of waiting.

use std::sync::Arc;

use botica_db::Database;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{SyncError, SyncResult};
use crate::push::Pusher;
use crate::transfer::{pull_invoices, pull_ledger, pull_model, push_model, Model};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSync {
    pub model: &'static str,
    pub first_run: bool,
    pub pulled: u64,
    pub pushed: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartSyncReport {
    pub models: Vec<ModelSync>,
    pub invoices_pulled: usize,
    pub ledger_pulled: usize,
    pub ledger_pushed: usize,
}

#[derive(Debug, Clone)]
pub struct SmartSync {
    db: Database,
    pusher: Pusher,
    running: Arc<Mutex<()>>,
}

impl SmartSync {
    pub fn new(db: Database, pusher: Pusher) -> Self {
        SmartSync {
            db,
            pusher,
            running: Arc::new(Mutex::new(())),
        }
    }

    /// Runs one smart sync.
    ///
    /// ## Errors
    /// * `SyncError::AlreadyRunning` - Another run holds the gate
    /// * `SyncError::Offline` / `Unavailable` / `Timeout` - Remote not answering
    pub async fn run(&self) -> SyncResult<SmartSyncReport> {
        let _gate = self.running.try_lock().map_err(|_| SyncError::AlreadyRunning)?;
        let pool = self.pusher.remote().check().await?;

        let mut report = SmartSyncReport::default();
        for model in Model::ALL {
            let since = self.db.sync_log().get(model.name()).await?;
            let started = Utc::now();

            let pulled = pull_model(&self.db, pool, model, since, true).await?;
            let pushed = match since {
                Some(_) => push_model(&self.db, pool, model, since, started, true).await?,
                None => 0,
            };
            self.db.sync_log().set(model.name(), started).await?;

            report.models.push(ModelSync {
                model: model.name(),
                first_run: since.is_none(),
                pulled,
                pushed,
            });
        }

        report.invoices_pulled = pull_invoices(&self.db, pool).await?;
        report.ledger_pulled = pull_ledger(&self.db, pool).await?;
        report.ledger_pushed = self.pusher.synchronize_ledger().await?;

        info!(
            invoices_pulled = report.invoices_pulled,
            ledger_pulled = report.ledger_pulled,
            ledger_pushed = report.ledger_pushed,
            "Smart sync finished"
        );
        Ok(report)
    }
}
