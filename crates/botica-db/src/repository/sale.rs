//! # Sale Engine
//!
//! Registers a sale as one local transaction: SALE ledger entries, the
//! invoice header and its lines commit together or not at all.
//!
//! ## Register Sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  validate request, client and seller active                            │
//! │       │                                                                 │
//! │  BEGIN                                                                  │
//! │   for each line (input order)                                           │
//! │       ├── lock_row(product)                                             │
//! │       ├── fold < quantity ──► InsufficientStock, rollback               │
//! │       ├── record SALE -quantity (invoice_id NULL)                       │
//! │       └── subtotal += quantity × unit price                             │
//! │   number = next(FAC-<max suffix>)                                       │
//! │   INSERT invoice (Paid) ──► INSERT lines                                │
//! │   UPDATE the entries recorded above SET invoice_id                      │
//! │  COMMIT                                                                 │
//! │       │                                                                 │
//! │  reload InvoiceDetail                                                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The caller triggers replication after this returns.

use botica_core::invoice::{next_invoice_number, TotalsAccumulator};
use botica_core::{
    Client, Invoice, InvoiceDetail, InvoiceLine, InvoiceLineDetail, InvoiceStatus, InvoiceSummary, Money, Page,
    PageRequest, Product, SaleRequest, Seller, SortOrder, StockOperationKind, TaxRate, INVOICE_PREFIX,
};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::lock::lock_row;
use crate::repository::ledger::{fold_in, record, NewStockOperation};
use crate::table::Table;
use crate::timestamp::now_text;

const SUMMARY_SELECT: &str = "SELECT i.id, i.number, i.issued_at, i.total_cents, \
     (c.name || ' ' || c.last_name) AS client_name, \
     (s.name || ' ' || s.last_name) AS seller_name \
     FROM invoices i \
     JOIN clients c ON c.id = i.client_id \
     JOIN sellers s ON s.id = i.seller_id";

const SEARCH: &str = "(i.number GLOB ? \
     OR (c.name || ' ' || c.last_name) GLOB ? \
     OR (s.name || ' ' || s.last_name) GLOB ?)";

const SORT_KEYS: &[(&str, &str)] = &[
    ("number", "CAST(substr(i.number, 5) AS INTEGER)"),
    ("issuedAt", "i.issued_at"),
    ("client", "client_name"),
    ("seller", "seller_name"),
    ("total", "i.total_cents"),
];

/// Highest-numbered invoice, or `None` in an empty store.
pub async fn last_number_in(conn: &mut SqliteConnection) -> DbResult<Option<String>> {
    let sql = format!(
        "SELECT number FROM invoices WHERE number LIKE '{}%' \
         ORDER BY CAST(substr(number, {}) AS INTEGER) DESC LIMIT 1",
        INVOICE_PREFIX,
        INVOICE_PREFIX.len() + 1
    );
    let number: Option<String> = sqlx::query_scalar(&sql).fetch_optional(&mut *conn).await?;
    Ok(number)
}

#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Registers a sale and returns the stored invoice.
    ///
    /// ## Errors
    /// * `DbError::Validation` - Empty sale, quantity < 1, negative price
    /// * `DbError::NotFound` - Client, seller or a product missing or deleted
    /// * `DbError::InsufficientStock` - A line asks for more than the fold;
    ///   nothing is written
    pub async fn register_sale(&self, req: &SaleRequest, vat_rate: TaxRate) -> DbResult<InvoiceDetail> {
        req.validate()?;
        self.ensure_active(Table::Clients, req.client_id).await?;
        self.ensure_active(Table::Sellers, req.seller_id).await?;

        let mut tx = self.pool.begin().await?;

        let mut totals = TotalsAccumulator::new();
        let mut entry_ids = Vec::with_capacity(req.lines.len());
        let mut line_totals = Vec::with_capacity(req.lines.len());

        for line in &req.lines {
            let product: Product = lock_row(&mut tx, Table::Products, line.product_id).await?;
            let available = fold_in(&mut tx, product.id).await?;
            if available < line.quantity {
                return Err(DbError::InsufficientStock {
                    code: product.code,
                    available,
                    requested: line.quantity,
                });
            }

            let entry = record(
                &mut tx,
                NewStockOperation::new(product.id, StockOperationKind::Sale, -line.quantity, req.seller_id),
            )
            .await?;
            entry_ids.push(entry.id);
            line_totals.push(totals.add_line(line.quantity, Money::from_cents(line.unit_price_cents))?);
        }

        let totals = totals.finish(vat_rate)?;
        let number = next_invoice_number(last_number_in(&mut tx).await?.as_deref());
        let now = now_text();

        let invoice_id = sqlx::query(
            "INSERT INTO invoices (number, issued_at, seller_id, client_id, subtotal_cents, vat_cents, total_cents, \
             status, payment_method, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&number)
        .bind(&now)
        .bind(req.seller_id)
        .bind(req.client_id)
        .bind(totals.subtotal.cents())
        .bind(totals.vat.cents())
        .bind(totals.total.cents())
        .bind(InvoiceStatus::Paid.as_str())
        .bind(req.payment_method.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for (line, line_total) in req.lines.iter().zip(&line_totals) {
            sqlx::query(
                "INSERT INTO invoice_lines (invoice_id, product_id, quantity, unit_price_cents, line_total_cents, \
                 created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(invoice_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line_total.cents())
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        for entry_id in &entry_ids {
            sqlx::query("UPDATE stock_operations SET invoice_id = ? WHERE id = ? AND invoice_id IS NULL")
                .bind(invoice_id)
                .bind(entry_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!(
            invoice = %number,
            lines = req.lines.len(),
            total_cents = totals.total.cents(),
            "Sale registered"
        );

        self.invoice(invoice_id).await
    }

    async fn ensure_active(&self, table: Table, id: i64) -> DbResult<()> {
        let sql = format!("SELECT id FROM {} WHERE id = ? AND deleted_at IS NULL", table.name());
        let found: Option<i64> = sqlx::query_scalar(&sql).bind(id).fetch_optional(&self.pool).await?;
        found.map(|_| ()).ok_or_else(|| DbError::not_found(table.entity(), id))
    }

    /// Invoice with client, seller summary and lines with products.
    pub async fn invoice(&self, id: i64) -> DbResult<InvoiceDetail> {
        let invoice = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", id))?;
        self.detail(invoice).await
    }

    pub async fn find_by_number(&self, number: &str) -> DbResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE number = ?")
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invoice)
    }

    async fn detail(&self, invoice: Invoice) -> DbResult<InvoiceDetail> {
        let client = sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = ?")
            .bind(invoice.client_id)
            .fetch_one(&self.pool)
            .await?;
        let seller = sqlx::query_as::<_, Seller>("SELECT * FROM sellers WHERE id = ?")
            .bind(invoice.seller_id)
            .fetch_one(&self.pool)
            .await?;

        let mut lines = Vec::new();
        for line in self.lines(invoice.id).await? {
            let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
                .bind(line.product_id)
                .fetch_one(&self.pool)
                .await?;
            lines.push(InvoiceLineDetail { line, product });
        }

        Ok(InvoiceDetail {
            invoice,
            client,
            seller: seller.summary(),
            lines,
        })
    }

    pub async fn lines(&self, invoice_id: i64) -> DbResult<Vec<InvoiceLine>> {
        let lines = sqlx::query_as::<_, InvoiceLine>(
            "SELECT * FROM invoice_lines WHERE invoice_id = ? AND deleted_at IS NULL ORDER BY id",
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    /// Invoice listing with client and seller names.
    ///
    /// Sort keys `number`, `issuedAt`, `client`, `seller`, `total`; newest
    /// first when none is given.
    pub async fn paginated_invoices(&self, req: &PageRequest) -> DbResult<Page<InvoiceSummary>> {
        let pattern = req.glob_pattern();
        let mut filter = String::from("i.deleted_at IS NULL");
        if pattern.is_some() {
            filter.push_str(" AND ");
            filter.push_str(SEARCH);
        }

        let requested = req.sort_by.trim();
        let order = match SORT_KEYS.iter().find(|(key, _)| key.eq_ignore_ascii_case(requested)) {
            Some((_, column)) => format!("ORDER BY {} {}, i.id ASC", column, req.sort_order.as_sql()),
            None => format!("ORDER BY i.id {}", SortOrder::Desc.as_sql()),
        };

        let count_sql = format!(
            "SELECT COUNT(*) FROM invoices i JOIN clients c ON c.id = i.client_id \
             JOIN sellers s ON s.id = i.seller_id WHERE {}",
            filter
        );
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(p) = &pattern {
            count = count.bind(p.clone()).bind(p.clone()).bind(p.clone());
        }
        let total_records = count.fetch_one(&self.pool).await?;

        let page_sql = format!("{} WHERE {} {} LIMIT ? OFFSET ?", SUMMARY_SELECT, filter, order);
        let mut query = sqlx::query_as::<_, InvoiceSummary>(&page_sql);
        if let Some(p) = &pattern {
            query = query.bind(p.clone()).bind(p.clone()).bind(p.clone());
        }
        let records = query
            .bind(req.limit())
            .bind(req.offset())
            .fetch_all(&self.pool)
            .await?;

        debug!(total_records, returned = records.len(), "Listed invoices");
        Ok(Page {
            records,
            total_records,
        })
    }

    pub async fn last_number(&self) -> DbResult<Option<String>> {
        let mut conn = self.pool.acquire().await?;
        last_number_in(&mut conn).await
    }

    pub async fn all(&self) -> DbResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(invoices)
    }

    /// Full details of every invoice, for bulk replication.
    pub async fn all_details(&self) -> DbResult<Vec<InvoiceDetail>> {
        let mut details = Vec::new();
        for invoice in self.all().await? {
            details.push(self.detail(invoice).await?);
        }
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::seller::SellerRecord;
    use botica_core::{ClientData, PaymentMethod, ProductData, SaleLineRequest};

    struct Fixture {
        db: Database,
        client_id: i64,
        seller_id: i64,
        product: Product,
    }

    async fn fixture(db: Database) -> Fixture {
        let client = db
            .clients()
            .register(&ClientData {
                name: "Ana".to_string(),
                last_name: "Rojas".to_string(),
                id_type: "CC".to_string(),
                id_number: "100".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let seller = db
            .sellers()
            .register(SellerRecord {
                name: "Luis".to_string(),
                last_name: "Pardo".to_string(),
                national_id: "200".to_string(),
                email: "luis@botica.test".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        let product = db
            .products()
            .register(&ProductData {
                name: "Acetaminofen".to_string(),
                code: "A".to_string(),
                sale_price_cents: 100,
                stock: 5,
            })
            .await
            .unwrap();
        Fixture {
            db,
            client_id: client.id,
            seller_id: seller.id,
            product,
        }
    }

    fn sale(f: &Fixture, quantity: i64) -> SaleRequest {
        SaleRequest {
            client_id: f.client_id,
            seller_id: f.seller_id,
            payment_method: PaymentMethod::Cash,
            lines: vec![SaleLineRequest {
                product_id: f.product.id,
                quantity,
                unit_price_cents: 100,
            }],
        }
    }

    #[tokio::test]
    async fn test_happy_sale() {
        let f = fixture(Database::new(DbConfig::in_memory()).await.unwrap()).await;
        let detail = f.db.sales().register_sale(&sale(&f, 2), TaxRate::zero()).await.unwrap();

        assert_eq!(detail.invoice.number, "FAC-1001");
        assert_eq!(detail.invoice.total_cents, 200);
        assert_eq!(detail.invoice.status, InvoiceStatus::Paid);
        assert_eq!(detail.seller.national_id, "200");
        assert_eq!(detail.lines.len(), 1);
        assert_eq!(detail.lines[0].product.stock, 3);

        let history = f.db.ledger().history(f.product.id).await.unwrap();
        let entry = &history[0];
        assert_eq!(entry.kind, StockOperationKind::Sale);
        assert_eq!(entry.quantity_delta, -2);
        assert_eq!(entry.resulting_stock, 3);
        assert_eq!(entry.invoice_id, Some(detail.invoice.id));
        assert_eq!(f.db.ledger().fold(f.product.id).await.unwrap(), 3);

        let second = f.db.sales().register_sale(&sale(&f, 1), TaxRate::zero()).await.unwrap();
        assert_eq!(second.invoice.number, "FAC-1002");
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_no_trace() {
        let f = fixture(Database::new(DbConfig::in_memory()).await.unwrap()).await;
        let err = f.db.sales().register_sale(&sale(&f, 6), TaxRate::zero()).await.unwrap_err();
        match err {
            DbError::InsufficientStock {
                code,
                available,
                requested,
            } => {
                assert_eq!(code, "A");
                assert_eq!(available, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(f.db.products().get(f.product.id).await.unwrap().stock, 5);
        assert_eq!(f.db.ledger().history(f.product.id).await.unwrap().len(), 1);
        assert!(f.db.sales().all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_vat_and_validation() {
        let f = fixture(Database::new(DbConfig::in_memory()).await.unwrap()).await;
        let detail = f
            .db
            .sales()
            .register_sale(&sale(&f, 1), TaxRate::from_bps(1900))
            .await
            .unwrap();
        assert_eq!(detail.invoice.subtotal_cents, 100);
        assert_eq!(detail.invoice.vat_cents, 19);
        assert_eq!(detail.invoice.total_cents, 119);

        let mut empty = sale(&f, 1);
        empty.lines.clear();
        assert!(matches!(
            f.db.sales().register_sale(&empty, TaxRate::zero()).await,
            Err(DbError::Validation(_))
        ));

        let mut ghost_client = sale(&f, 1);
        ghost_client.client_id = 999;
        assert!(matches!(
            f.db.sales().register_sale(&ghost_client, TaxRate::zero()).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_invoice_listing_defaults_to_newest_first() {
        let f = fixture(Database::new(DbConfig::in_memory()).await.unwrap()).await;
        for _ in 0..3 {
            f.db.sales().register_sale(&sale(&f, 1), TaxRate::zero()).await.unwrap();
        }

        let page = f.db.sales().paginated_invoices(&PageRequest::new(1, 2)).await.unwrap();
        assert_eq!(page.total_records, 3);
        assert_eq!(page.records[0].number, "FAC-1003");
        assert_eq!(page.records[0].client_name, "Ana Rojas");

        let found = f
            .db
            .sales()
            .paginated_invoices(&PageRequest::new(1, 10).search("fac-1002"))
            .await
            .unwrap();
        assert_eq!(found.total_records, 1);

        let by_seller = f
            .db
            .sales()
            .paginated_invoices(&PageRequest::new(1, 10).search("pardo").sort("number", SortOrder::Asc))
            .await
            .unwrap();
        assert_eq!(by_seller.records[0].number, "FAC-1001");
    }

    #[tokio::test]
    async fn test_concurrent_sales_never_oversell() {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::new(dir.path().join("botica.db")).max_connections(4);
        let f = fixture(Database::new(config).await.unwrap()).await;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let sales = f.db.sales();
            let req = sale(&f, 2);
            handles.push(tokio::spawn(async move { sales.register_sale(&req, TaxRate::zero()).await }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(DbError::InsufficientStock { .. }) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(succeeded, 2);
        assert_eq!(f.db.ledger().fold(f.product.id).await.unwrap(), 1);
        assert_eq!(f.db.products().get(f.product.id).await.unwrap().stock, 1);
    }
}
