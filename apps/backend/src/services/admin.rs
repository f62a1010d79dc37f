use std::path::Path;

use botica_db::NormalizeReport;
use botica_import::{ImportSummary, ImportTarget};
use botica_sync::{ReplicationStatus, SmartSyncReport};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::backend::Backend;
use crate::error::ApiResult;

/// Which stores a reset wiped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetReport {
    pub local: bool,
    pub remote: bool,
}

impl Backend {
    /// Rewrites every cached product stock from its ledger. All or nothing.
    pub async fn normalize_all_stocks(&self) -> ApiResult<NormalizeReport> {
        Ok(self.db.ledger().normalize_all().await?)
    }

    /// Wipes the local store, and the remote one when it answers.
    ///
    /// A remote that cannot be reached or reset leaves `remote: false`; the
    /// local reset still counts.
    pub async fn reset_all_data(&self) -> ApiResult<ResetReport> {
        warn!("Resetting all data");
        self.db.deep_reset().await?;

        let remote = self.agent.remote();
        let remote_reset = if remote.is_configured() {
            match remote.reset().await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Remote reset skipped");
                    false
                }
            }
        } else {
            false
        };

        info!(remote = remote_reset, "Reset finished");
        Ok(ResetReport {
            local: true,
            remote: remote_reset,
        })
    }

    /// Runs a CSV import and then pushes the ledger entries it wrote.
    ///
    /// `target` is `Products` or `Clients`, any case. The receiver yields
    /// the progress lines of the run; it is already complete when returned.
    pub async fn import_csv(
        &self,
        path: impl AsRef<Path>,
        target: &str,
    ) -> ApiResult<(ImportSummary, UnboundedReceiver<String>)> {
        let target: ImportTarget = target.parse()?;
        let (summary, progress) = botica_import::import_csv(&self.db, path, target).await?;
        if target == ImportTarget::Products && summary.successful_rows > 0 {
            self.agent.synchronize_ledger();
        }
        Ok((summary, progress))
    }

    /// Incremental two-way sync. Only one run at a time.
    pub async fn smart_sync(&self) -> ApiResult<SmartSyncReport> {
        Ok(self.agent.smart_sync().await?)
    }

    pub async fn replication_status(&self) -> ReplicationStatus {
        self.agent.status().await
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::backend::tests::{new_seller, offline_backend};
    use crate::error::ErrorCode;
    use botica_core::{PageRequest, ProductData, PurchaseLineRequest, PurchaseRequest, SupplierData};

    #[tokio::test]
    async fn test_normalize_restores_the_ledger_stock() {
        let backend = offline_backend().await;
        let product = backend
            .register_product(&ProductData {
                name: "Acetaminofen".to_string(),
                code: "A".to_string(),
                sale_price_cents: 1000,
                stock: 5,
            })
            .await
            .unwrap();
        let supplier = backend
            .register_supplier(&SupplierData {
                name: "Medisur".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        backend
            .register_purchase(&PurchaseRequest {
                supplier_id: supplier.id,
                supplier_invoice_number: "MS-1".to_string(),
                lines: vec![PurchaseLineRequest {
                    product_id: product.id,
                    quantity: 10,
                    unit_cost_cents: 400,
                }],
            })
            .await
            .unwrap();

        sqlx::query("UPDATE products SET stock = 0 WHERE id = ?")
            .bind(product.id)
            .execute(backend.database().pool())
            .await
            .unwrap();

        let report = backend.normalize_all_stocks().await.unwrap();
        assert_eq!(report.corrections.len(), 1);
        assert_eq!(report.corrections[0].cached, 0);
        assert_eq!(report.corrections[0].fold, 15);

        let cached: i64 = sqlx::query_scalar("SELECT stock FROM products WHERE id = ?")
            .bind(product.id)
            .fetch_one(backend.database().pool())
            .await
            .unwrap();
        assert_eq!(cached, 15);

        // A second run finds nothing left to correct.
        assert!(backend.normalize_all_stocks().await.unwrap().corrections.is_empty());
    }

    #[tokio::test]
    async fn test_reset_keeps_only_the_system_seller() {
        let backend = offline_backend().await;
        backend.register_seller(&new_seller("1020", "ana@botica.co")).await.unwrap();

        let report = backend.reset_all_data().await.unwrap();
        assert!(report.local);
        assert!(!report.remote);
        assert_eq!(backend.database().sellers().count_business().await.unwrap(), 0);
        assert!(backend.database().sellers().find_by_national_id("SYSTEM").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_import_through_the_facade() {
        let backend = offline_backend().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("productos.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Nombre,Codigo,Precio_Venta,Stock").unwrap();
        writeln!(file, "Acetaminofen,A1,1200,5").unwrap();
        writeln!(file, "Ibuprofeno,B2,800,abc").unwrap();
        drop(file);

        let (summary, mut progress) = backend.import_csv(&path, "products").await.unwrap();
        assert_eq!(summary.total_rows, 2);
        assert_eq!(summary.successful_rows, 1);
        assert_eq!(summary.failed_rows, 1);

        let mut lines = Vec::new();
        while let Some(line) = progress.recv().await {
            lines.push(line);
        }
        assert!(lines.last().unwrap().starts_with("import finished"));

        let page = backend.list_products(&PageRequest::new(1, 10)).await.unwrap();
        assert_eq!(page.total_records, 1);
        assert_eq!(page.records[0].stock, 5);

        let unknown = backend.import_csv(&path, "Suppliers").await.unwrap_err();
        assert_eq!(unknown.code, ErrorCode::Validation);
    }

    #[tokio::test]
    async fn test_offline_smart_sync_reports_the_remote() {
        let backend = offline_backend().await;
        let err = backend.smart_sync().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RemoteUnavailable);
        assert!(!backend.replication_status().await.online);
    }
}
