//! # Initial Reconciliation
//!
//! Decides, once per startup, whether one store should be bulk-copied into
//! the other.
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────────────────────────────────┐
//! │ local seller │ remote seller│ action                                   │
//! ├──────────────┼──────────────┼──────────────────────────────────────────┤
//! │ > 0          │ 0            │ push everything local                    │
//! │ 0            │ > 0          │ pull masters, invoices, ledger           │
//! │ 0            │ 0            │ nothing                                  │
//! │ > 0          │ > 0          │ nothing, per-operation pushes take over  │
//! └──────────────┴──────────────┴──────────────────────────────────────────┘
//! ```
//!
//! Counts ignore the seeded system seller, which both stores always have.

use botica_db::Database;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::SyncResult;
use crate::push::Pusher;
use crate::rows;
use crate::transfer::{pull_invoices, pull_ledger, pull_model, push_model, Model};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReconcileAction {
    PushAll,
    PullAll,
    /// Both stores empty.
    Nothing,
    /// Both stores populated.
    Incremental,
}

impl ReconcileAction {
    pub fn decide(local_sellers: i64, remote_sellers: i64) -> Self {
        match (local_sellers > 0, remote_sellers > 0) {
            (true, false) => ReconcileAction::PushAll,
            (false, true) => ReconcileAction::PullAll,
            (false, false) => ReconcileAction::Nothing,
            (true, true) => ReconcileAction::Incremental,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub action: ReconcileAction,
    /// Master rows written to the target store.
    pub rows: u64,
    pub invoices: usize,
    pub ledger_entries: usize,
}

impl ReconcileReport {
    fn empty(action: ReconcileAction) -> Self {
        ReconcileReport {
            action,
            rows: 0,
            invoices: 0,
            ledger_entries: 0,
        }
    }
}

/// Runs the startup reconciliation.
///
/// ## Errors
/// * `SyncError::Offline` - No remote store; nothing to reconcile
/// * any remote or local failure of the bulk copy
pub async fn reconcile(db: &Database, pusher: &Pusher) -> SyncResult<ReconcileReport> {
    let pool = pusher.remote().check().await?;

    let local = db.sellers().count_business().await?;
    let remote = rows::business_seller_count(pool).await?;
    let action = ReconcileAction::decide(local, remote);
    info!(local, remote, action = ?action, "Initial reconciliation");

    let mut report = ReconcileReport::empty(action);
    match action {
        ReconcileAction::Nothing | ReconcileAction::Incremental => {}

        ReconcileAction::PushAll => {
            let until = Utc::now();
            for model in Model::ALL {
                report.rows += push_model(db, pool, model, None, until, false).await?;
            }
            for detail in db.sales().all_details().await? {
                if pusher.push_invoice(&detail).await? {
                    report.invoices += 1;
                }
            }
            for detail in db.purchases().all_details().await? {
                if let Err(e) = pusher.push_purchase(&detail).await {
                    warn!(purchase_id = detail.purchase.id, error = %e, "Purchase push failed");
                }
            }
            report.ledger_entries = pusher.synchronize_ledger().await?;
        }

        ReconcileAction::PullAll => {
            for model in Model::ALL {
                report.rows += pull_model(db, pool, model, None, false).await?;
            }
            report.invoices = pull_invoices(db, pool).await?;
            report.ledger_entries = pull_ledger(db, pool).await?;
        }
    }

    info!(
        action = ?report.action,
        rows = report.rows,
        invoices = report.invoices,
        ledger_entries = report.ledger_entries,
        "Initial reconciliation finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::tests::{sell, shop};
    use crate::remote::tests::sqlite_remote;
    use botica_db::DbConfig;

    #[test]
    fn test_decision_table() {
        assert_eq!(ReconcileAction::decide(3, 0), ReconcileAction::PushAll);
        assert_eq!(ReconcileAction::decide(0, 2), ReconcileAction::PullAll);
        assert_eq!(ReconcileAction::decide(0, 0), ReconcileAction::Nothing);
        assert_eq!(ReconcileAction::decide(1, 1), ReconcileAction::Incremental);
    }

    #[tokio::test]
    async fn test_push_all_then_pull_all_into_a_second_till() {
        let shop = shop().await;
        sell(&shop, 2).await;
        let dir = tempfile::tempdir().unwrap();
        let remote = sqlite_remote(&dir).await;

        let first = Pusher::new(shop.db.clone(), remote.clone());
        let pushed = reconcile(&shop.db, &first).await.unwrap();
        assert_eq!(pushed.action, ReconcileAction::PushAll);
        assert_eq!(pushed.invoices, 1);
        assert_eq!(pushed.ledger_entries, 2);

        let second_db = Database::new(DbConfig::in_memory()).await.unwrap();
        let second = Pusher::new(second_db.clone(), remote.clone());
        let pulled = reconcile(&second_db, &second).await.unwrap();
        assert_eq!(pulled.action, ReconcileAction::PullAll);
        assert_eq!(pulled.invoices, 1);
        assert_eq!(pulled.ledger_entries, 2);

        let product = second_db.products().find_by_code("A").await.unwrap().unwrap();
        assert_eq!(product.stock, 3);
        assert_eq!(second_db.sellers().count_business().await.unwrap(), 1);

        let again = reconcile(&second_db, &second).await.unwrap();
        assert_eq!(again.action, ReconcileAction::Incremental);
    }

    #[tokio::test]
    async fn test_offline_reconcile_is_an_error() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let pusher = Pusher::new(db.clone(), crate::remote::RemoteStore::offline());
        assert!(reconcile(&db, &pusher).await.is_err());
    }
}
