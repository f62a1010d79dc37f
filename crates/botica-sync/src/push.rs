//! # Incremental Push
//!
//! Writes one local change to the remote store after the local commit.
//!
//! ## Push Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  push_invoice(detail)            one remote transaction                 │
//! │    1. seller      ON CONFLICT (national_id) DO UPDATE                   │
//! │    2. client      ON CONFLICT (id_number)   DO UPDATE                   │
//! │    3. products    ON CONFLICT (code)        DO UPDATE                   │
//! │    4. invoice     ON CONFLICT (number)      DO NOTHING                  │
//! │    5. lines       only when step 4 inserted the header                  │
//! │                                                                         │
//! │  synchronize_ledger()                                                   │
//! │    unsynchronized ──► referenced rows ──► entries by uuid (DO NOTHING)  │
//! │                   ──► commit ──► mark_synchronized locally              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lines have no business key of their own, so replaying a push must not
//! insert them twice. Tying them to the header insert keeps every push
//! idempotent.

use std::collections::{BTreeMap, BTreeSet};

use botica_core::{Client, InvoiceDetail, Product, PurchaseDetail, Seller, Supplier, SYSTEM_SELLER_ID};
use botica_db::mapping::{client_row, policy, product_row, seller_row, supplier_row};
use botica_db::{Database, Table};
use sqlx::AnyConnection;
use tracing::{debug, info};

use crate::error::SyncResult;
use crate::mapping::{
    invoice_line_row, invoice_row, line_policy, purchase_line_row, purchase_row, stock_operation_row,
};
use crate::remote::{upsert_remote, RemoteStore};

/// Pushes local rows to the remote store.
#[derive(Debug, Clone)]
pub struct Pusher {
    db: Database,
    remote: RemoteStore,
}

impl Pusher {
    pub fn new(db: Database, remote: RemoteStore) -> Self {
        Pusher { db, remote }
    }

    pub fn remote(&self) -> &RemoteStore {
        &self.remote
    }

    pub async fn push_seller(&self, seller: &Seller) -> SyncResult<u64> {
        let pool = self.remote.check().await?;
        let mut conn = pool.acquire().await?;
        upsert_remote(&mut conn, Table::Sellers, &[seller_row(seller)], &policy::sellers()).await
    }

    pub async fn push_client(&self, client: &Client) -> SyncResult<u64> {
        let pool = self.remote.check().await?;
        let mut conn = pool.acquire().await?;
        upsert_remote(&mut conn, Table::Clients, &[client_row(client)], &policy::clients()).await
    }

    pub async fn push_supplier(&self, supplier: &Supplier) -> SyncResult<u64> {
        let pool = self.remote.check().await?;
        let mut conn = pool.acquire().await?;
        upsert_remote(&mut conn, Table::Suppliers, &[supplier_row(supplier)], &policy::suppliers()).await
    }

    pub async fn push_product(&self, product: &Product) -> SyncResult<u64> {
        let pool = self.remote.check().await?;
        let mut conn = pool.acquire().await?;
        upsert_remote(&mut conn, Table::Products, &[product_row(product)], &policy::products()).await
    }

    /// Pushes an invoice with everything it references.
    ///
    /// ## Returns
    /// `true` when the remote did not have the invoice yet.
    pub async fn push_invoice(&self, detail: &InvoiceDetail) -> SyncResult<bool> {
        let pool = self.remote.check().await?;
        let seller = self.db.sellers().get_any(detail.invoice.seller_id).await?;

        let mut tx = pool.begin().await?;
        let inserted = write_invoice(&mut tx, &seller, detail).await?;
        tx.commit().await?;

        debug!(number = %detail.invoice.number, inserted, "Invoice pushed");
        Ok(inserted)
    }

    pub async fn push_purchase(&self, detail: &PurchaseDetail) -> SyncResult<bool> {
        let pool = self.remote.check().await?;

        let mut tx = pool.begin().await?;
        let inserted = write_purchase(&mut tx, detail).await?;
        tx.commit().await?;

        debug!(
            supplier = %detail.supplier.name,
            supplier_invoice_number = %detail.purchase.supplier_invoice_number,
            inserted,
            "Purchase pushed"
        );
        Ok(inserted)
    }

    /// Replicates every unsynchronized ledger entry and flips its flag.
    ///
    /// The only writer of `synchronized`. Entries go out by uuid with
    /// do-nothing on conflict, so a repeated push leaves the remote as it
    /// was.
    ///
    /// ## Returns
    /// Number of entries marked synchronized.
    pub async fn synchronize_ledger(&self) -> SyncResult<usize> {
        let pending = self.db.ledger().unsynchronized().await?;
        if pending.is_empty() {
            return Ok(0);
        }
        let pool = self.remote.check().await?;

        let invoice_ids: BTreeSet<i64> = pending.iter().filter_map(|op| op.invoice_id).collect();
        let mut invoices = Vec::with_capacity(invoice_ids.len());
        for id in invoice_ids {
            invoices.push(self.db.sales().invoice(id).await?);
        }
        let mut products = BTreeMap::new();
        let mut sellers = BTreeMap::new();
        for op in &pending {
            if !products.contains_key(&op.product_id) {
                products.insert(op.product_id, self.db.products().get_any(op.product_id).await?);
            }
            if !sellers.contains_key(&op.seller_id) {
                sellers.insert(op.seller_id, self.db.sellers().get_any(op.seller_id).await?);
            }
        }
        let mut invoice_sellers = BTreeMap::new();
        for detail in &invoices {
            let id = detail.invoice.seller_id;
            if !invoice_sellers.contains_key(&id) && !sellers.contains_key(&id) {
                invoice_sellers.insert(id, self.db.sellers().get_any(id).await?);
            }
        }

        let mut tx = pool.begin().await?;

        for seller in sellers.values().filter(|s| s.id != SYSTEM_SELLER_ID) {
            upsert_remote(&mut tx, Table::Sellers, &[seller_row(seller)], &policy::sellers()).await?;
        }
        let product_rows: Vec<_> = products.values().map(product_row).collect();
        upsert_remote(&mut tx, Table::Products, &product_rows, &policy::products()).await?;

        let mut numbers = BTreeMap::new();
        for detail in &invoices {
            let seller_id = detail.invoice.seller_id;
            if let Some(seller) = sellers.get(&seller_id).or_else(|| invoice_sellers.get(&seller_id)) {
                write_invoice(&mut tx, seller, detail).await?;
            }
            numbers.insert(detail.invoice.id, detail.invoice.number.clone());
        }

        let mut inserted = 0;
        for op in &pending {
            let (Some(product), Some(seller)) = (products.get(&op.product_id), sellers.get(&op.seller_id)) else {
                continue;
            };
            let number = op.invoice_id.and_then(|id| numbers.get(&id)).map(String::as_str);
            let row = stock_operation_row(op, &product.code, &seller.national_id, number);
            inserted += upsert_remote(&mut tx, Table::StockOperations, &[row], &policy::stock_operations()).await?;
        }

        tx.commit().await?;

        let uuids: Vec<String> = pending.iter().map(|op| op.uuid.clone()).collect();
        let marked = self.db.ledger().mark_synchronized(&uuids).await?;
        info!(pending = pending.len(), inserted, marked, "Ledger synchronized");
        Ok(marked as usize)
    }
}

/// Invoice header and lines, after the rows they reference.
pub(crate) async fn write_invoice(
    conn: &mut AnyConnection,
    seller: &Seller,
    detail: &InvoiceDetail,
) -> SyncResult<bool> {
    upsert_remote(conn, Table::Sellers, &[seller_row(seller)], &policy::sellers()).await?;
    upsert_remote(conn, Table::Clients, &[client_row(&detail.client)], &policy::clients()).await?;
    let products: Vec<_> = detail.lines.iter().map(|l| product_row(&l.product)).collect();
    upsert_remote(conn, Table::Products, &products, &policy::products()).await?;

    let header = invoice_row(&detail.invoice, &seller.national_id, &detail.client.id_number);
    let inserted = upsert_remote(conn, Table::Invoices, &[header], &policy::invoices()).await? == 1;
    if inserted {
        let lines: Vec<_> = detail
            .lines
            .iter()
            .map(|l| invoice_line_row(&l.line, &detail.invoice.number, &l.product.code))
            .collect();
        upsert_remote(conn, Table::InvoiceLines, &lines, &line_policy()).await?;
    }
    Ok(inserted)
}

async fn write_purchase(conn: &mut AnyConnection, detail: &PurchaseDetail) -> SyncResult<bool> {
    upsert_remote(conn, Table::Suppliers, &[supplier_row(&detail.supplier)], &policy::suppliers()).await?;
    let products: Vec<_> = detail.lines.iter().map(|l| product_row(&l.product)).collect();
    upsert_remote(conn, Table::Products, &products, &policy::products()).await?;

    let header = purchase_row(&detail.purchase, &detail.supplier.name);
    let inserted = upsert_remote(conn, Table::Purchases, &[header], &policy::purchases()).await? == 1;
    if inserted {
        let lines: Vec<_> = detail
            .lines
            .iter()
            .map(|l| {
                purchase_line_row(
                    &l.line,
                    &detail.supplier.name,
                    &detail.purchase.supplier_invoice_number,
                    &l.product.code,
                )
            })
            .collect();
        upsert_remote(conn, Table::PurchaseLines, &lines, &line_policy()).await?;
    }
    Ok(inserted)
}
