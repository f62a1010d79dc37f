//! Bulk transfers between the stores, shared by the startup reconcile and
//! smart sync.
//!
//! Master tables move as plain upserts by business key. Invoices move with
//! do-nothing on conflict and bring their lines only when the header is new.
//! Ledger entries are never upserted into the local store: they are
//! re-recorded through the ledger so the local fold and `resulting_stock`
//! stay consistent.

use std::collections::HashMap;

use botica_core::{StockOperationKind, SYSTEM_SELLER_ID};
use botica_db::lock::claim_write_lock;
use botica_db::mapping::{client_row, policy, product_row, product_row_with_stock, seller_row, supplier_row};
use botica_db::repository::ledger::record_replicated;
use botica_db::upsert::{upsert_local, ConflictPolicy, UpsertRow};
use botica_db::{Database, NewStockOperation, Table};
use chrono::{DateTime, Utc};
use sqlx::AnyPool;
use tracing::{debug, warn};

use crate::error::SyncResult;
use crate::mapping::{invoice_line_row, invoice_row, line_policy};
use crate::remote::upsert_remote;
use crate::rows;

/// A master table replicated by watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    Sellers,
    Clients,
    Suppliers,
    Products,
}

impl Model {
    /// Sync order. Products last: pulled ledger entries need them.
    pub const ALL: [Model; 4] = [Model::Sellers, Model::Clients, Model::Suppliers, Model::Products];

    /// Key in `sync_log`.
    pub const fn name(&self) -> &'static str {
        match self {
            Model::Sellers => "sellers",
            Model::Clients => "clients",
            Model::Suppliers => "suppliers",
            Model::Products => "products",
        }
    }

    pub const fn table(&self) -> Table {
        match self {
            Model::Sellers => Table::Sellers,
            Model::Clients => Table::Clients,
            Model::Suppliers => Table::Suppliers,
            Model::Products => Table::Products,
        }
    }

    fn policy(&self, newer_only: bool) -> ConflictPolicy {
        let policy = match self {
            Model::Sellers => policy::sellers(),
            Model::Clients => policy::clients(),
            Model::Suppliers => policy::suppliers(),
            Model::Products => policy::products(),
        };
        if newer_only {
            policy.last_writer_wins()
        } else {
            policy
        }
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Upserts remote rows changed after `since` into the local store.
///
/// Products arrive with stock 0 and never overwrite local stock: the local
/// ledger is the only source of it.
pub async fn pull_model(
    db: &Database,
    pool: &AnyPool,
    model: Model,
    since: Option<DateTime<Utc>>,
    newer_only: bool,
) -> SyncResult<u64> {
    let (rows, policy): (Vec<UpsertRow>, ConflictPolicy) = match model {
        Model::Sellers => (
            rows::sellers(pool, since).await?.iter().map(seller_row).collect(),
            model.policy(newer_only),
        ),
        Model::Clients => (
            rows::clients(pool, since).await?.iter().map(client_row).collect(),
            model.policy(newer_only),
        ),
        Model::Suppliers => (
            rows::suppliers(pool, since).await?.iter().map(supplier_row).collect(),
            model.policy(newer_only),
        ),
        Model::Products => (
            rows::products(pool, since)
                .await?
                .iter()
                .map(|p| product_row_with_stock(p, 0))
                .collect(),
            model.policy(newer_only).without(&["stock"]),
        ),
    };
    if rows.is_empty() {
        return Ok(0);
    }

    let mut tx = db.begin().await?;
    let applied = upsert_local(&mut tx, model.table(), &rows, &policy).await?;
    Database::commit(tx).await?;

    debug!(model = %model, fetched = rows.len(), applied, "Pulled remote rows");
    Ok(applied)
}

/// Upserts local rows changed in `(since, until]` into the remote store.
pub async fn push_model(
    db: &Database,
    pool: &AnyPool,
    model: Model,
    since: Option<DateTime<Utc>>,
    until: DateTime<Utc>,
    newer_only: bool,
) -> SyncResult<u64> {
    let rows: Vec<UpsertRow> = match model {
        Model::Sellers => db.sellers().updated_between(since, until).await?.iter().map(seller_row).collect(),
        Model::Clients => db.clients().updated_between(since, until).await?.iter().map(client_row).collect(),
        Model::Suppliers => db
            .suppliers()
            .updated_between(since, until)
            .await?
            .iter()
            .map(supplier_row)
            .collect(),
        Model::Products => db
            .products()
            .updated_between(since, until)
            .await?
            .iter()
            .map(product_row)
            .collect(),
    };
    if rows.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let applied = upsert_remote(&mut tx, model.table(), &rows, &model.policy(newer_only)).await?;
    tx.commit().await?;

    debug!(model = %model, sent = rows.len(), applied, "Pushed local rows");
    Ok(applied)
}

/// Copies remote invoices the local store does not know, with their lines.
///
/// An invoice whose seller or client is missing locally is skipped.
///
/// ## Returns
/// Number of invoices inserted locally.
pub async fn pull_invoices(db: &Database, pool: &AnyPool) -> SyncResult<usize> {
    let mut inserted = 0;
    for remote in rows::invoices(pool).await? {
        let number = remote.invoice.number.clone();
        if db.sales().find_by_number(&number).await?.is_some() {
            continue;
        }
        let lines = rows::invoice_lines(pool, &number).await?;

        let header = invoice_row(&remote.invoice, &remote.seller_national_id, &remote.client_id_number);
        let line_rows: Vec<UpsertRow> = lines
            .iter()
            .map(|l| invoice_line_row(&l.line, &number, &l.product_code))
            .collect();

        let mut tx = db.begin().await?;
        let outcome = async {
            let created = upsert_local(&mut tx, Table::Invoices, &[header], &policy::invoices()).await? == 1;
            if created {
                upsert_local(&mut tx, Table::InvoiceLines, &line_rows, &line_policy()).await?;
            }
            Ok::<bool, botica_db::DbError>(created)
        }
        .await;

        match outcome {
            Ok(created) => {
                Database::commit(tx).await?;
                if created {
                    inserted += 1;
                }
            }
            Err(e) => {
                warn!(number = %number, error = %e, "Skipping remote invoice that does not resolve locally");
            }
        }
    }
    Ok(inserted)
}

/// Re-records remote ledger entries the local store does not know.
///
/// Entries keep their uuid and timestamp and arrive `synchronized`.
/// `resulting_stock` is recomputed as the local running fold. Entries whose
/// product is unknown locally, or that would take the local fold below zero,
/// are skipped with a warning.
///
/// ## Returns
/// Number of entries recorded.
pub async fn pull_ledger(db: &Database, pool: &AnyPool) -> SyncResult<usize> {
    let remote_entries = rows::stock_operations(pool).await?;

    let mut products: HashMap<String, Option<i64>> = HashMap::new();
    let mut sellers: HashMap<String, i64> = HashMap::new();
    let mut invoices: HashMap<String, Option<i64>> = HashMap::new();
    let mut pending = Vec::new();

    for entry in remote_entries {
        if db.ledger().find_by_uuid(&entry.operation.uuid).await?.is_some() {
            continue;
        }

        let product_id = match products.get(&entry.product_code) {
            Some(id) => *id,
            None => {
                let id = db.products().find_by_code(&entry.product_code).await?.map(|p| p.id);
                products.insert(entry.product_code.clone(), id);
                id
            }
        };
        let Some(product_id) = product_id else {
            warn!(uuid = %entry.operation.uuid, code = %entry.product_code, "Remote ledger entry for unknown product");
            continue;
        };

        let seller_id = match sellers.get(&entry.seller_national_id) {
            Some(id) => *id,
            None => {
                let id = db
                    .sellers()
                    .find_by_national_id(&entry.seller_national_id)
                    .await?
                    .map_or(SYSTEM_SELLER_ID, |s| s.id);
                sellers.insert(entry.seller_national_id.clone(), id);
                id
            }
        };

        let invoice_id = match &entry.invoice_number {
            Some(number) => match invoices.get(number) {
                Some(id) => *id,
                None => {
                    let id = db.sales().find_by_number(number).await?.map(|i| i.id);
                    invoices.insert(number.clone(), id);
                    id
                }
            },
            None => None,
        };

        let mut op = NewStockOperation::new(
            product_id,
            entry.operation.kind,
            entry.operation.quantity_delta,
            seller_id,
        )
        .replicated(entry.operation.uuid.clone(), entry.operation.timestamp);
        if entry.operation.kind == StockOperationKind::Sale {
            op.invoice_id = invoice_id;
        }
        pending.push(op);
    }

    if pending.is_empty() {
        return Ok(0);
    }

    let mut tx = db.begin().await?;
    claim_write_lock(&mut tx).await?;
    let mut recorded = 0;
    for op in pending {
        if record_replicated(&mut tx, op).await?.is_some() {
            recorded += 1;
        }
    }
    Database::commit(tx).await?;

    debug!(recorded, "Pulled remote ledger entries");
    Ok(recorded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::tests::{sell, shop};
    use crate::push::Pusher;
    use crate::remote::tests::sqlite_remote;
    use botica_db::DbConfig;

    #[tokio::test]
    async fn test_pull_into_empty_store_rebuilds_stock_from_ledger() {
        let shop = shop().await;
        sell(&shop, 2).await;
        let dir = tempfile::tempdir().unwrap();
        let remote = sqlite_remote(&dir).await;
        let pusher = Pusher::new(shop.db.clone(), remote.clone());
        pusher.synchronize_ledger().await.unwrap();
        let pool = remote.check().await.unwrap();
        push_model(&shop.db, pool, Model::Clients, None, Utc::now(), false).await.unwrap();

        let fresh = Database::new(DbConfig::in_memory()).await.unwrap();
        for model in Model::ALL {
            pull_model(&fresh, pool, model, None, false).await.unwrap();
        }
        let product = fresh.products().find_by_code("A").await.unwrap().unwrap();
        assert_eq!(product.stock, 0);

        assert_eq!(pull_invoices(&fresh, pool).await.unwrap(), 1);
        assert_eq!(pull_ledger(&fresh, pool).await.unwrap(), 2);

        let product = fresh.products().get(product.id).await.unwrap();
        assert_eq!(product.stock, 3);
        assert_eq!(fresh.ledger().fold(product.id).await.unwrap(), 3);
        assert!(fresh.ledger().unsynchronized().await.unwrap().is_empty());

        let sale = &fresh.ledger().history(product.id).await.unwrap()[0];
        assert_eq!(sale.resulting_stock, 3);
        let invoice = fresh.sales().find_by_number("FAC-1001").await.unwrap().unwrap();
        assert_eq!(sale.invoice_id, Some(invoice.id));
        assert_eq!(fresh.sales().lines(invoice.id).await.unwrap().len(), 1);

        // Second pull is a no-op.
        assert_eq!(pull_invoices(&fresh, pool).await.unwrap(), 0);
        assert_eq!(pull_ledger(&fresh, pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pulled_product_keeps_local_stock() {
        let shop = shop().await;
        let dir = tempfile::tempdir().unwrap();
        let remote = sqlite_remote(&dir).await;
        let pool = remote.check().await.unwrap();

        let mut remote_copy = shop.product.clone();
        remote_copy.name = "Ibuprofeno 400".to_string();
        remote_copy.stock = 99;
        let mut conn = pool.acquire().await.unwrap();
        upsert_remote(&mut conn, Table::Products, &[product_row(&remote_copy)], &policy::products())
            .await
            .unwrap();
        drop(conn);

        pull_model(&shop.db, pool, Model::Products, None, false).await.unwrap();
        let local = shop.db.products().get(shop.product.id).await.unwrap();
        assert_eq!(local.name, "Ibuprofeno 400");
        assert_eq!(local.stock, 5);
    }
}
