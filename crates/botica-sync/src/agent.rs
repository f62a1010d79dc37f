//! # Replication Agent
//!
//! Owns the background side of replication: fire-and-forget pushes after
//! local commits, the startup reconcile, smart sync, and shutdown.
//!
//! ## Task Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   facade commit ──► agent.push_*() ──► tracker.spawn(task)              │
//! │                                              │                          │
//! │                      ┌───────────────────────┴──────────────┐           │
//! │                      ▼                                      ▼           │
//! │               cancelled first                        push finishes      │
//! │               (task dropped, remote           Ok  ──► status updated    │
//! │                tx rolls back)                 Err ──► warn!, last_error │
//! │                                                                         │
//! │   shutdown(): cancel ──► tracker.close ──► tracker.wait ──► pool.close  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pushes are not ordered with respect to each other. Every payload is an
//! idempotent upsert by business key, so any arrival order converges.

use std::future::Future;
use std::sync::Arc;

use botica_core::{Client, InvoiceDetail, Product, PurchaseDetail, Seller, Supplier};
use botica_db::Database;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::push::Pusher;
use crate::reconcile::{reconcile, ReconcileReport};
use crate::remote::RemoteStore;
use crate::smart::{SmartSync, SmartSyncReport};

// =============================================================================
// Replication Status
// =============================================================================

/// Snapshot for the admin surface.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationStatus {
    /// Whether the last probe reached the remote store.
    pub online: bool,

    /// Last background failure, if any.
    pub last_error: Option<String>,

    /// Entries marked synchronized by the last ledger push.
    pub last_ledger_push: Option<usize>,

    pub last_ledger_push_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Replication Agent
// =============================================================================

#[derive(Debug, Clone)]
pub struct ReplicationAgent {
    pusher: Pusher,
    smart: SmartSync,
    db: Database,
    tracker: TaskTracker,
    cancel: CancellationToken,
    status: Arc<RwLock<ReplicationStatus>>,
}

impl ReplicationAgent {
    pub fn new(db: Database, remote: RemoteStore) -> Self {
        let pusher = Pusher::new(db.clone(), remote);
        let status = ReplicationStatus {
            online: pusher.remote().is_online(),
            ..Default::default()
        };
        ReplicationAgent {
            smart: SmartSync::new(db.clone(), pusher.clone()),
            pusher,
            db,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            status: Arc::new(RwLock::new(status)),
        }
    }

    pub fn remote(&self) -> &RemoteStore {
        self.pusher.remote()
    }

    pub fn pusher(&self) -> &Pusher {
        &self.pusher
    }

    pub async fn status(&self) -> ReplicationStatus {
        let mut status = self.status.read().await.clone();
        status.online = self.remote().is_online();
        status
    }

    /// Number of background tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Spawns a tracked, cancellable background task. Failures are logged
    /// and recorded in the status, never returned.
    fn spawn<F, T>(&self, what: &'static str, task: F) -> Option<JoinHandle<Option<T>>>
    where
        F: Future<Output = SyncResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        if self.cancel.is_cancelled() {
            debug!(what, "Agent shutting down, push dropped");
            return None;
        }
        if !self.remote().is_configured() {
            return None;
        }

        let cancel = self.cancel.clone();
        let status = Arc::clone(&self.status);
        Some(self.tracker.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(what, "Background push cancelled");
                    None
                }
                outcome = task => match outcome {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!(what, error = %e, "Background push failed");
                        status.write().await.last_error = Some(format!("{}: {}", what, e));
                        None
                    }
                },
            }
        }))
    }

    pub fn push_seller(&self, seller: Seller) {
        let pusher = self.pusher.clone();
        self.spawn("seller", async move { pusher.push_seller(&seller).await });
    }

    pub fn push_client(&self, client: Client) {
        let pusher = self.pusher.clone();
        self.spawn("client", async move { pusher.push_client(&client).await });
    }

    pub fn push_supplier(&self, supplier: Supplier) {
        let pusher = self.pusher.clone();
        self.spawn("supplier", async move { pusher.push_supplier(&supplier).await });
    }

    pub fn push_product(&self, product: Product) {
        let pusher = self.pusher.clone();
        self.spawn("product", async move { pusher.push_product(&product).await });
    }

    /// Pushes the invoice, then the unsynchronized ledger.
    pub fn push_sale(&self, detail: InvoiceDetail) {
        let pusher = self.pusher.clone();
        self.spawn("invoice", async move { pusher.push_invoice(&detail).await });
        self.synchronize_ledger();
    }

    pub fn push_purchase(&self, detail: PurchaseDetail) {
        let pusher = self.pusher.clone();
        self.spawn("purchase", async move { pusher.push_purchase(&detail).await });
        self.synchronize_ledger();
    }

    /// Background ledger push. Returns the handle so callers that care can
    /// wait for the count.
    pub fn synchronize_ledger(&self) -> Option<JoinHandle<Option<usize>>> {
        let pusher = self.pusher.clone();
        let status = Arc::clone(&self.status);
        self.spawn("ledger", async move {
            let marked = pusher.synchronize_ledger().await?;
            let mut status = status.write().await;
            status.last_ledger_push = Some(marked);
            status.last_ledger_push_at = Some(Utc::now());
            Ok(marked)
        })
    }

    /// Spawns the startup reconciliation without blocking startup.
    pub fn spawn_reconcile(&self) -> Option<JoinHandle<Option<ReconcileReport>>> {
        let db = self.db.clone();
        let pusher = self.pusher.clone();
        self.spawn("reconcile", async move { reconcile(&db, &pusher).await })
    }

    /// Runs a smart sync in the caller's task.
    pub async fn smart_sync(&self) -> SyncResult<SmartSyncReport> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::ShuttingDown);
        }
        let outcome = self.smart.run().await;
        if let Err(e) = &outcome {
            self.status.write().await.last_error = Some(format!("smart sync: {}", e));
        }
        outcome
    }

    /// Waits for the background pushes spawned so far to finish.
    pub async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Cancels background work, waits for the tasks to stop and closes the
    /// remote pool.
    pub async fn shutdown(&self) {
        info!(in_flight = self.tracker.len(), "Stopping replication agent");
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        self.remote().close().await;
    }
}
