//! # Import Pipeline
//!
//! ## Task Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  spawn_blocking: producer                                               │
//! │    csv::Reader ── skip vacuous rows ── count ──► rows (bounded mpsc)    │
//! │                                                     │                   │
//! │                          ┌──────────┬──────────┬────┴─────┐             │
//! │                          ▼          ▼          ▼          ▼             │
//! │                      validator  validator  validator  validator         │
//! │                      (map_row; failures go to the log)                  │
//! │                          │          │          │          │             │
//! │                          └──────────┴────┬─────┴──────────┘             │
//! │                                          ▼                              │
//! │                               records (bounded mpsc)                    │
//! │                                          │                              │
//! │  driver task: collector                  ▼                              │
//! │    batch of 500 ──► one local Tx ──► commit ──► log.succeed(n)          │
//! │                          └── any error ──► rollback, log.fail_batch(n)  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Products upsert by `code` without touching `stock`; the batch Tx then
//! brings each product to the CSV stock through the ledger. Clients upsert
//! by `id_number`.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use botica_core::{ClientData, ProductData, SYSTEM_SELLER_ID};
use botica_db::lock::claim_write_lock;
use botica_db::mapping::policy;
use botica_db::repository::ledger::adjust_to;
use botica_db::upsert::{upsert_local, UpsertRow};
use botica_db::{Database, DbResult, Table};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ImportError, ImportResult};
use crate::log::{ImportLog, ImportSummary};
use crate::mapper::{map_row, Mapped, RawRow, Record};
use crate::target::ImportTarget;

/// Validator tasks.
pub const WORKERS: usize = 4;

/// Records per local transaction.
pub const BATCH_SIZE: usize = 500;

const CHANNEL_CAPACITY: usize = 1024;

/// A running import.
#[derive(Debug)]
pub struct ImportHandle {
    /// Progress lines ("inserting batch of N", the final summary).
    pub progress: mpsc::UnboundedReceiver<String>,
    log: Arc<ImportLog>,
    driver: JoinHandle<ImportResult<()>>,
}

impl ImportHandle {
    /// Live counters.
    pub fn snapshot(&self) -> ImportSummary {
        self.log.summary()
    }

    /// Waits for the pipeline to drain.
    pub async fn finish(self) -> ImportResult<(ImportSummary, mpsc::UnboundedReceiver<String>)> {
        self.driver.await??;
        Ok((self.log.summary(), self.progress))
    }
}

/// Opens the file, checks the headers and starts the pipeline.
///
/// ## Errors
/// * `ImportError::Open` - File cannot be read
/// * `ImportError::MissingHeaders` - Required columns absent
/// * `ImportError::Csv` - Header row is not valid CSV
pub async fn start_import(db: &Database, path: impl AsRef<Path>, target: ImportTarget) -> ImportResult<ImportHandle> {
    let path = path.as_ref().to_path_buf();
    let shown = path.display().to_string();
    let (reader, headers) = tokio::task::spawn_blocking(move || open(path, target)).await??;
    info!(target = %target, path = %shown, "Starting CSV import");

    let log = Arc::new(ImportLog::new());
    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    let (row_tx, row_rx) = mpsc::channel::<RawRow>(CHANNEL_CAPACITY);
    let (record_tx, record_rx) = mpsc::channel::<Mapped>(CHANNEL_CAPACITY);

    let producer = {
        let log = Arc::clone(&log);
        tokio::task::spawn_blocking(move || produce(reader, &headers, &row_tx, &log))
    };

    let row_rx = Arc::new(Mutex::new(row_rx));
    let validators: Vec<JoinHandle<()>> = (0..WORKERS)
        .map(|_| tokio::spawn(validate(target, Arc::clone(&row_rx), record_tx.clone(), Arc::clone(&log))))
        .collect();
    drop(record_tx);

    let db = db.clone();
    let driver_log = Arc::clone(&log);
    let driver = tokio::spawn(async move {
        let _ = progress_tx.send(format!("importing {} from {}", target, shown));
        collect(&db, record_rx, &driver_log, &progress_tx).await;

        producer.await?;
        for validator in validators {
            validator.await?;
        }

        let summary = driver_log.summary();
        info!(
            target = %target,
            total = summary.total_rows,
            successful = summary.successful_rows,
            failed = summary.failed_rows,
            "CSV import finished"
        );
        let _ = progress_tx.send(format!(
            "import finished: {} rows, {} successful, {} failed",
            summary.total_rows, summary.successful_rows, summary.failed_rows
        ));
        Ok(())
    });

    Ok(ImportHandle {
        progress: progress_rx,
        log,
        driver,
    })
}

/// Runs an import to completion.
///
/// Returns the final summary and the progress lines the run emitted.
pub async fn import_csv(
    db: &Database,
    path: impl AsRef<Path>,
    target: ImportTarget,
) -> ImportResult<(ImportSummary, mpsc::UnboundedReceiver<String>)> {
    start_import(db, path, target).await?.finish().await
}

// =============================================================================
// Producer
// =============================================================================

fn open(path: PathBuf, target: ImportTarget) -> ImportResult<(csv::Reader<File>, Vec<String>)> {
    let file = File::open(&path).map_err(|source| ImportError::Open { path, source })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_lowercase()).collect();
    let missing = target.missing_headers(&headers);
    if !missing.is_empty() {
        return Err(ImportError::MissingHeaders {
            target: target.to_string(),
            missing,
        });
    }
    Ok((reader, headers))
}

fn produce(mut reader: csv::Reader<File>, headers: &[String], rows: &mpsc::Sender<RawRow>, log: &ImportLog) {
    for (index, record) in reader.records().enumerate() {
        let line = index + 1;
        match record {
            Ok(record) => {
                if record.iter().all(|field| field.trim().is_empty()) {
                    continue;
                }
                log.count_row();
                if rows.blocking_send(RawRow::new(line, headers, &record)).is_err() {
                    break;
                }
            }
            Err(e) => {
                log.count_row();
                log.fail_row(line, e);
            }
        }
    }
}

// =============================================================================
// Validators
// =============================================================================

async fn validate(
    target: ImportTarget,
    rows: Arc<Mutex<mpsc::Receiver<RawRow>>>,
    records: mpsc::Sender<Mapped>,
    log: Arc<ImportLog>,
) {
    loop {
        let next = rows.lock().await.recv().await;
        let Some(row) = next else { break };
        match map_row(target, &row) {
            Ok(mapped) => {
                if records.send(mapped).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(line = row.line, error = %e, "CSV row rejected");
                log.fail_row(row.line, e);
            }
        }
    }
}

// =============================================================================
// Collector
// =============================================================================

async fn collect(
    db: &Database,
    mut records: mpsc::Receiver<Mapped>,
    log: &ImportLog,
    progress: &mpsc::UnboundedSender<String>,
) {
    let mut batch = Vec::with_capacity(BATCH_SIZE);
    while let Some(mapped) = records.recv().await {
        batch.push(mapped);
        if batch.len() == BATCH_SIZE {
            flush(db, &mut batch, log, progress).await;
        }
    }
    if !batch.is_empty() {
        flush(db, &mut batch, log, progress).await;
    }
}

async fn flush(db: &Database, batch: &mut Vec<Mapped>, log: &ImportLog, progress: &mpsc::UnboundedSender<String>) {
    let rows = batch.len();
    let _ = progress.send(format!("inserting batch of {}", rows));

    match write_batch(db, batch).await {
        Ok(()) => log.succeed(rows),
        Err(e) => {
            let first = batch.iter().map(|m| m.line).min().unwrap_or_default();
            let last = batch.iter().map(|m| m.line).max().unwrap_or_default();
            warn!(rows, first, last, error = %e, "Import batch failed");
            log.fail_batch(rows, first, last, e);
        }
    }
    batch.clear();
}

async fn write_batch(db: &Database, batch: &[Mapped]) -> DbResult<()> {
    let now = Utc::now();
    let mut tx = db.begin().await?;
    claim_write_lock(&mut tx).await?;

    let products = policy::products().without(&["stock"]);
    let clients = policy::clients();
    for mapped in batch {
        match &mapped.record {
            Record::Product(product) => {
                upsert_local(&mut tx, Table::Products, &[product_row(product, now)], &products).await?;
                let id: i64 = sqlx::query_scalar("SELECT id FROM products WHERE code = ?")
                    .bind(product.code.trim())
                    .fetch_one(&mut *tx)
                    .await?;
                adjust_to(&mut tx, id, product.stock, SYSTEM_SELLER_ID).await?;
            }
            Record::Client(client) => {
                upsert_local(&mut tx, Table::Clients, &[client_row(client, now)], &clients).await?;
            }
        }
    }

    Database::commit(tx).await
}

/// New products start at stock 0; the ledger sets the real value.
fn product_row(product: &ProductData, now: DateTime<Utc>) -> UpsertRow {
    UpsertRow::new()
        .text("name", product.name.trim())
        .text("code", product.code.trim())
        .int("sale_price_cents", product.sale_price_cents)
        .int("stock", 0)
        .timestamp("created_at", now)
        .timestamp("updated_at", now)
}

fn client_row(client: &ClientData, now: DateTime<Utc>) -> UpsertRow {
    UpsertRow::new()
        .text("name", client.name.trim())
        .text("last_name", client.last_name.trim())
        .text("id_type", client.id_type.trim())
        .text("id_number", client.id_number.trim())
        .text("phone", client.phone.trim())
        .text("email", client.email.trim())
        .text("address", client.address.trim())
        .timestamp("created_at", now)
        .timestamp("updated_at", now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use botica_core::StockOperationKind;
    use botica_db::DbConfig;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn drain(mut progress: mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = progress.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_bad_row_is_counted_and_the_rest_imported() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "productos.csv",
            "nombre,codigo,precio_venta,stock\n\
             Acetaminofen,A1,\"2,50\",10\n\
             Ibuprofeno,A2,3000,abc\n\
             Loratadina,A3,1200,0\n",
        );

        let (summary, progress) = import_csv(&db, &path, ImportTarget::Products).await.unwrap();
        assert_eq!(summary.total_rows, 3);
        assert_eq!(summary.successful_rows, 2);
        assert_eq!(summary.failed_rows, 1);
        assert_eq!(summary.failed_errors.len(), 1);
        assert!(summary.failed_errors[0].starts_with("row 2:"), "{}", summary.failed_errors[0]);

        let a1 = db.products().find_by_code("A1").await.unwrap().unwrap();
        assert_eq!(a1.sale_price_cents, 250);
        assert_eq!(a1.stock, 10);
        let history = db.ledger().history(a1.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, StockOperationKind::Initial);
        assert_eq!(history[0].seller_id, SYSTEM_SELLER_ID);

        let a3 = db.products().find_by_code("A3").await.unwrap().unwrap();
        assert_eq!(a3.stock, 0);
        assert!(db.ledger().history(a3.id).await.unwrap().is_empty());
        assert!(db.products().find_by_code("A2").await.unwrap().is_none());

        let lines = drain(progress);
        assert!(lines.iter().any(|l| l == "inserting batch of 2"));
        assert!(lines.last().unwrap().starts_with("import finished: 3 rows"));
    }

    #[tokio::test]
    async fn test_reimport_updates_price_and_adjusts_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let first = write_csv(&dir, "a.csv", "nombre,codigo,precio_venta,stock\nDolex,D1,1000,10\n");
        let second = write_csv(&dir, "b.csv", "nombre,codigo,precio_venta,stock\nDolex Forte,D1,1500,4\n");

        import_csv(&db, &first, ImportTarget::Products).await.unwrap();
        let (summary, _) = import_csv(&db, &second, ImportTarget::Products).await.unwrap();
        assert_eq!(summary.successful_rows, 1);

        let product = db.products().find_by_code("D1").await.unwrap().unwrap();
        assert_eq!(product.name, "Dolex Forte");
        assert_eq!(product.sale_price_cents, 1500);
        assert_eq!(product.stock, 4);
        assert_eq!(db.ledger().fold(product.id).await.unwrap(), 4);
        let history = db.ledger().history(product.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history
            .iter()
            .any(|e| e.kind == StockOperationKind::Adjust && e.quantity_delta == -6));
    }

    #[tokio::test]
    async fn test_clients_import_normalizes_headers_and_skips_vacuous_rows() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "clientes.csv",
            " Nombre ,APELLIDO,tipo_id,numero_id,telefono,email,direccion\n\
             Luisa,Pardo,CC,100,3001234567,luisa@correo.co,Calle 1\n\
             ,,,,,,\n\
             Mario,Rios,CC,,3000000000,,Calle 2\n",
        );

        let (summary, _) = import_csv(&db, &path, ImportTarget::Clients).await.unwrap();
        assert_eq!(summary.total_rows, 2);
        assert_eq!(summary.successful_rows, 1);
        assert_eq!(summary.failed_rows, 1);
        assert!(summary.failed_errors[0].starts_with("row 3:"));

        let luisa = db.clients().find_by_id_number("100").await.unwrap().unwrap();
        assert_eq!(luisa.last_name, "Pardo");
        assert_eq!(luisa.address, "Calle 1");
    }

    #[tokio::test]
    async fn test_missing_headers_fail_before_any_row() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "p.csv", "nombre,codigo,precio_venta\nDolex,D1,1000\n");

        match import_csv(&db, &path, ImportTarget::Products).await {
            Err(ImportError::MissingHeaders { missing, .. }) => assert_eq!(missing, vec!["stock".to_string()]),
            other => panic!("expected MissingHeaders, got {:?}", other.map(|(s, _)| s)),
        }

        let missing_file = dir.path().join("nope.csv");
        assert!(matches!(
            import_csv(&db, &missing_file, ImportTarget::Products).await,
            Err(ImportError::Open { .. })
        ));
    }

    #[tokio::test]
    async fn test_rows_are_committed_in_batches() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut content = String::from("nombre,codigo,precio_venta,stock\n");
        for i in 0..(BATCH_SIZE + 1) {
            content.push_str(&format!("Producto {i},P{i},100,1\n"));
        }
        let path = write_csv(&dir, "big.csv", &content);

        let (summary, progress) = import_csv(&db, &path, ImportTarget::Products).await.unwrap();
        assert_eq!(summary.total_rows, BATCH_SIZE + 1);
        assert_eq!(summary.successful_rows, BATCH_SIZE + 1);
        let lines = drain(progress);
        assert!(lines.iter().any(|l| l == "inserting batch of 500"));
        assert!(lines.iter().any(|l| l == "inserting batch of 1"));
    }

    #[tokio::test]
    async fn test_failed_batch_counts_every_row() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "p.csv",
            "nombre,codigo,precio_venta,stock\nDolex,D1,1000,1\nAdvil,D2,2000,2\n",
        );
        db.close().await;

        let (summary, _) = import_csv(&db, &path, ImportTarget::Products).await.unwrap();
        assert_eq!(summary.total_rows, 2);
        assert_eq!(summary.successful_rows, 0);
        assert_eq!(summary.failed_rows, 2);
        assert!(summary.failed_errors[0].starts_with("rows 1-2:"));
    }
}
