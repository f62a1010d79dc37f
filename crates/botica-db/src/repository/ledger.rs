//! # Stock Ledger
//!
//! Append-only log of stock movements. The stock of a product is the sum of
//! its `quantity_delta` values; `products.stock` is a cache of that sum and
//! is written in the same transaction as every entry.
//!
//! ## Entry Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  lock_row(product) ──► fold_in ──► append ──► set_product_stock        │
//! │                          │           │                                  │
//! │                          │           └── resulting = fold + delta >= 0  │
//! │                          └── SUM(quantity_delta) of active entries      │
//! │                                                                         │
//! │  record() = append + set_product_stock                                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The free functions take a connection so they compose inside the sale,
//! purchase, product and import transactions. Callers hold the product's
//! row lock before calling them.

use botica_core::{CoreError, StockAdjustment, StockOperation, StockOperationKind, ValidationError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::lock::{claim_write_lock, lock_row};
use crate::table::Table;
use crate::timestamp::{now_text, to_db_text};
use botica_core::Product;

/// A ledger entry before insertion. `resulting_stock` is computed by
/// [`append`].
#[derive(Debug, Clone)]
pub struct NewStockOperation {
    pub product_id: i64,
    pub kind: StockOperationKind,
    pub quantity_delta: i64,
    pub seller_id: i64,
    pub invoice_id: Option<i64>,
    /// Kept when replicating an entry from the other store.
    pub uuid: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub synchronized: bool,
}

impl NewStockOperation {
    pub fn new(product_id: i64, kind: StockOperationKind, quantity_delta: i64, seller_id: i64) -> Self {
        NewStockOperation {
            product_id,
            kind,
            quantity_delta,
            seller_id,
            invoice_id: None,
            uuid: None,
            timestamp: None,
            synchronized: false,
        }
    }

    /// An entry that already exists in the remote store.
    pub fn replicated(mut self, uuid: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        self.uuid = Some(uuid.into());
        self.timestamp = Some(timestamp);
        self.synchronized = true;
        self
    }
}

/// Current ledger sum of a product.
pub async fn fold_in(conn: &mut SqliteConnection, product_id: i64) -> DbResult<i64> {
    let (_, sum) = entry_stats(conn, product_id).await?;
    Ok(sum)
}

/// `(entry count, sum of deltas)` over active entries.
async fn entry_stats(conn: &mut SqliteConnection, product_id: i64) -> DbResult<(i64, i64)> {
    let stats: (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(quantity_delta), 0) FROM stock_operations \
         WHERE product_id = ? AND deleted_at IS NULL",
    )
    .bind(product_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(stats)
}

/// Inserts one entry with `resulting_stock = fold + delta`.
///
/// ## Errors
/// * `DbError::Rule` - The delta has the wrong sign for the kind, or the
///   product would go below zero
pub async fn append(conn: &mut SqliteConnection, op: NewStockOperation) -> DbResult<StockOperation> {
    if !op.kind.accepts_delta(op.quantity_delta) {
        return Err(DbError::Rule(format!(
            "{} entry cannot carry a delta of {}",
            op.kind, op.quantity_delta
        )));
    }

    let previous = fold_in(conn, op.product_id).await?;
    let resulting = previous
        .checked_add(op.quantity_delta)
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "quantity".to_string(),
        })?;
    if resulting < 0 {
        return Err(CoreError::NegativeStock {
            product_id: op.product_id,
            resulting,
        }
        .into());
    }

    let uuid = op.uuid.unwrap_or_else(StockOperation::new_uuid);
    let now = now_text();
    let timestamp = op.timestamp.map(to_db_text).unwrap_or_else(|| now.clone());

    let id = sqlx::query(
        "INSERT INTO stock_operations \
         (uuid, product_id, kind, quantity_delta, resulting_stock, seller_id, invoice_id, timestamp, synchronized, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&uuid)
    .bind(op.product_id)
    .bind(op.kind.as_str())
    .bind(op.quantity_delta)
    .bind(resulting)
    .bind(op.seller_id)
    .bind(op.invoice_id)
    .bind(&timestamp)
    .bind(op.synchronized)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    debug!(
        product_id = op.product_id,
        kind = %op.kind,
        delta = op.quantity_delta,
        resulting,
        "Appended ledger entry"
    );

    let entry = sqlx::query_as::<_, StockOperation>("SELECT * FROM stock_operations WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(entry)
}

pub async fn set_product_stock(conn: &mut SqliteConnection, product_id: i64, stock: i64) -> DbResult<()> {
    sqlx::query("UPDATE products SET stock = ?, updated_at = ? WHERE id = ?")
        .bind(stock)
        .bind(now_text())
        .bind(product_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Appends an entry and moves the product's cached stock with it.
pub async fn record(conn: &mut SqliteConnection, op: NewStockOperation) -> DbResult<StockOperation> {
    let entry = append(conn, op).await?;
    set_product_stock(conn, entry.product_id, entry.resulting_stock).await?;
    Ok(entry)
}

/// Rewrites `products.stock` with the fold when they disagree.
///
/// ## Returns
/// `(cached, fold)` as they were before the repair
pub async fn recompute_product_stock(conn: &mut SqliteConnection, product_id: i64) -> DbResult<(i64, i64)> {
    let cached: i64 = sqlx::query_scalar("SELECT stock FROM products WHERE id = ?")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Product", product_id))?;
    let fold = fold_in(conn, product_id).await?;
    if cached != fold {
        set_product_stock(conn, product_id, fold).await?;
    }
    Ok((cached, fold))
}

/// Brings a product to `desired` units with a single entry.
///
/// A product without entries gets an INITIAL entry, anything else an
/// ADJUST for the difference. No entry when already at `desired`.
pub async fn adjust_to(
    conn: &mut SqliteConnection,
    product_id: i64,
    desired: i64,
    seller_id: i64,
) -> DbResult<Option<StockOperation>> {
    if desired < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "stock".to_string(),
        }
        .into());
    }

    let (entries, fold) = entry_stats(conn, product_id).await?;
    let delta = desired - fold;
    if delta == 0 {
        return Ok(None);
    }

    let kind = if entries == 0 && delta > 0 {
        StockOperationKind::Initial
    } else {
        StockOperationKind::Adjust
    };
    let entry = record(conn, NewStockOperation::new(product_id, kind, delta, seller_id)).await?;
    Ok(Some(entry))
}

/// Records an entry pulled from the remote store.
///
/// Returns `None` when the uuid is already known, or when applying the
/// delta would take the local fold below zero. The latter is logged and
/// skipped.
pub async fn record_replicated(
    conn: &mut SqliteConnection,
    op: NewStockOperation,
) -> DbResult<Option<StockOperation>> {
    if let Some(uuid) = &op.uuid {
        let known: Option<i64> = sqlx::query_scalar("SELECT id FROM stock_operations WHERE uuid = ?")
            .bind(uuid)
            .fetch_optional(&mut *conn)
            .await?;
        if known.is_some() {
            return Ok(None);
        }
    }

    let fold = fold_in(conn, op.product_id).await?;
    if fold.checked_add(op.quantity_delta).map_or(true, |resulting| resulting < 0) {
        warn!(
            product_id = op.product_id,
            uuid = ?op.uuid,
            fold,
            delta = op.quantity_delta,
            "Skipping replicated ledger entry that would make stock negative or overflow"
        );
        return Ok(None);
    }

    record(conn, op).await.map(Some)
}

// =============================================================================
// Repository
// =============================================================================

/// One product whose cached stock disagreed with its ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockCorrection {
    pub product_id: i64,
    pub code: String,
    pub cached: i64,
    pub fold: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeReport {
    pub products: usize,
    pub corrections: Vec<StockCorrection>,
}

#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    pub async fn fold(&self, product_id: i64) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        fold_in(&mut conn, product_id).await
    }

    /// Entries of one product, newest first.
    pub async fn history(&self, product_id: i64) -> DbResult<Vec<StockOperation>> {
        let entries = sqlx::query_as::<_, StockOperation>(
            "SELECT * FROM stock_operations WHERE product_id = ? AND deleted_at IS NULL ORDER BY id DESC",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// Recomputes every product's cached stock in one transaction.
    pub async fn normalize_all(&self) -> DbResult<NormalizeReport> {
        let mut tx = self.pool.begin().await?;
        claim_write_lock(&mut tx).await?;

        let products: Vec<(i64, String)> = sqlx::query_as("SELECT id, code FROM products ORDER BY id")
            .fetch_all(&mut *tx)
            .await?;

        let mut report = NormalizeReport {
            products: products.len(),
            corrections: Vec::new(),
        };
        for (product_id, code) in products {
            let (cached, fold) = recompute_product_stock(&mut tx, product_id).await?;
            if cached != fold {
                report.corrections.push(StockCorrection {
                    product_id,
                    code,
                    cached,
                    fold,
                });
            }
        }

        tx.commit().await?;
        info!(
            products = report.products,
            corrected = report.corrections.len(),
            "Normalized product stock"
        );
        Ok(report)
    }

    /// Applies many stock corrections atomically.
    pub async fn bulk_adjust(
        &self,
        adjustments: &[StockAdjustment],
        seller_id: i64,
    ) -> DbResult<Vec<StockOperation>> {
        let mut tx = self.pool.begin().await?;
        claim_write_lock(&mut tx).await?;

        let mut entries = Vec::new();
        for adjustment in adjustments {
            lock_row::<Product>(&mut tx, Table::Products, adjustment.product_id).await?;
            if let Some(entry) = adjust_to(&mut tx, adjustment.product_id, adjustment.new_stock, seller_id).await? {
                entries.push(entry);
            }
        }

        tx.commit().await?;
        Ok(entries)
    }

    /// Entries not yet pushed to the remote store, oldest first.
    pub async fn unsynchronized(&self) -> DbResult<Vec<StockOperation>> {
        let entries = sqlx::query_as::<_, StockOperation>(
            "SELECT * FROM stock_operations WHERE synchronized = 0 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// Flips `synchronized` for the given uuids.
    pub async fn mark_synchronized(&self, uuids: &[String]) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut marked = 0;
        for uuid in uuids {
            marked += sqlx::query("UPDATE stock_operations SET synchronized = 1 WHERE uuid = ? AND synchronized = 0")
                .bind(uuid)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(marked)
    }

    pub async fn find_by_uuid(&self, uuid: &str) -> DbResult<Option<StockOperation>> {
        let entry = sqlx::query_as::<_, StockOperation>("SELECT * FROM stock_operations WHERE uuid = ?")
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    pub async fn all(&self) -> DbResult<Vec<StockOperation>> {
        let entries = sqlx::query_as::<_, StockOperation>("SELECT * FROM stock_operations ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use botica_core::{ProductData, SYSTEM_SELLER_ID};

    async fn db_with_product(stock: i64) -> (Database, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .products()
            .register(&ProductData {
                name: "Acetaminofen".to_string(),
                code: "A".to_string(),
                sale_price_cents: 100,
                stock,
            })
            .await
            .unwrap();
        (db, product)
    }

    #[tokio::test]
    async fn test_append_rejects_wrong_sign_and_negative_fold() {
        let (db, product) = db_with_product(2).await;
        let mut conn = db.pool().acquire().await.unwrap();

        let wrong_sign = NewStockOperation::new(product.id, StockOperationKind::Sale, 1, SYSTEM_SELLER_ID);
        assert!(matches!(append(&mut conn, wrong_sign).await, Err(DbError::Rule(_))));

        let too_many = NewStockOperation::new(product.id, StockOperationKind::Sale, -3, SYSTEM_SELLER_ID);
        assert!(append(&mut conn, too_many).await.is_err());

        assert_eq!(fold_in(&mut conn, product.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_resulting_stock_is_running_fold() {
        let (db, product) = db_with_product(5).await;
        let mut conn = db.pool().acquire().await.unwrap();

        record(&mut conn, NewStockOperation::new(product.id, StockOperationKind::Purchase, 10, SYSTEM_SELLER_ID))
            .await
            .unwrap();
        record(&mut conn, NewStockOperation::new(product.id, StockOperationKind::Sale, -4, SYSTEM_SELLER_ID))
            .await
            .unwrap();
        drop(conn);

        let mut history = db.ledger().history(product.id).await.unwrap();
        history.reverse();
        let mut running = 0;
        for entry in &history {
            running += entry.quantity_delta;
            assert_eq!(entry.resulting_stock, running);
        }
        assert_eq!(running, 11);
        assert_eq!(db.products().get(product.id).await.unwrap().stock, 11);
        assert_eq!(history[0].kind, StockOperationKind::Initial);
    }

    #[tokio::test]
    async fn test_adjust_to_picks_kind() {
        let (db, product) = db_with_product(0).await;
        assert!(db.ledger().history(product.id).await.unwrap().is_empty());

        let mut conn = db.pool().acquire().await.unwrap();
        let first = adjust_to(&mut conn, product.id, 7, SYSTEM_SELLER_ID).await.unwrap().unwrap();
        assert_eq!(first.kind, StockOperationKind::Initial);

        let down = adjust_to(&mut conn, product.id, 3, SYSTEM_SELLER_ID).await.unwrap().unwrap();
        assert_eq!(down.kind, StockOperationKind::Adjust);
        assert_eq!(down.quantity_delta, -4);

        assert!(adjust_to(&mut conn, product.id, 3, SYSTEM_SELLER_ID).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_normalize_repairs_out_of_band_edit() {
        let (db, product) = db_with_product(15).await;
        sqlx::query("UPDATE products SET stock = 0 WHERE id = ?")
            .bind(product.id)
            .execute(db.pool())
            .await
            .unwrap();

        let report = db.ledger().normalize_all().await.unwrap();
        assert_eq!(report.products, 1);
        assert_eq!(
            report.corrections,
            vec![StockCorrection {
                product_id: product.id,
                code: "A".to_string(),
                cached: 0,
                fold: 15
            }]
        );
        assert_eq!(db.products().get(product.id).await.unwrap().stock, 15);
        assert!(db.ledger().normalize_all().await.unwrap().corrections.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_adjust_is_all_or_nothing() {
        let (db, product) = db_with_product(5).await;
        let adjustments = [
            StockAdjustment {
                product_id: product.id,
                new_stock: 9,
            },
            StockAdjustment {
                product_id: 999,
                new_stock: 1,
            },
        ];
        assert!(matches!(
            db.ledger().bulk_adjust(&adjustments, SYSTEM_SELLER_ID).await,
            Err(DbError::NotFound { .. })
        ));
        assert_eq!(db.ledger().fold(product.id).await.unwrap(), 5);

        let entries = db.ledger().bulk_adjust(&adjustments[..1], SYSTEM_SELLER_ID).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(db.products().get(product.id).await.unwrap().stock, 9);
    }

    #[tokio::test]
    async fn test_mark_synchronized_and_replicated_entries() {
        let (db, product) = db_with_product(5).await;
        let pending = db.ledger().unsynchronized().await.unwrap();
        assert_eq!(pending.len(), 1);

        let uuids: Vec<String> = pending.iter().map(|e| e.uuid.clone()).collect();
        assert_eq!(db.ledger().mark_synchronized(&uuids).await.unwrap(), 1);
        assert_eq!(db.ledger().mark_synchronized(&uuids).await.unwrap(), 0);
        assert!(db.ledger().unsynchronized().await.unwrap().is_empty());

        let mut conn = db.pool().acquire().await.unwrap();
        let remote = NewStockOperation::new(product.id, StockOperationKind::Sale, -2, SYSTEM_SELLER_ID)
            .replicated("remote-1", Utc::now());
        let pulled = record_replicated(&mut conn, remote.clone()).await.unwrap().unwrap();
        assert!(pulled.synchronized);
        assert_eq!(pulled.resulting_stock, 3);
        assert!(record_replicated(&mut conn, remote).await.unwrap().is_none());

        let overdraw = NewStockOperation::new(product.id, StockOperationKind::Sale, -10, SYSTEM_SELLER_ID)
            .replicated("remote-2", Utc::now());
        assert!(record_replicated(&mut conn, overdraw).await.unwrap().is_none());
        assert_eq!(fold_in(&mut conn, product.id).await.unwrap(), 3);
    }
}
