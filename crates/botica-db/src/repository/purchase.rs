//! Purchase engine: stock receipts from suppliers.
//!
//! Same discipline as sales. Each line locks its product and records a
//! PURCHASE entry owned by the system seller; header and lines commit with
//! the entries.

use botica_core::{
    Money, Page, PageRequest, Product, Purchase, PurchaseDetail, PurchaseLine, PurchaseLineDetail, PurchaseRequest,
    StockOperationKind, Supplier, ValidationError, SYSTEM_SELLER_ID,
};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::lock::lock_row;
use crate::repository::ledger::{record, NewStockOperation};
use crate::repository::paging::{paginate, ListSpec};
use crate::table::Table;
use crate::timestamp::now_text;

const LIST: ListSpec = ListSpec {
    table: Table::Purchases,
    search_columns: &["supplier_invoice_number"],
    sort_keys: &[
        ("date", "date"),
        ("supplierInvoiceNumber", "supplier_invoice_number"),
        ("total", "total_cents"),
    ],
    default_sort: "date",
};

#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    /// Registers a purchase and returns it with supplier and lines.
    ///
    /// ## Errors
    /// * `DbError::NotFound` - Supplier or a product missing or deleted
    /// * `DbError::UniqueViolation` - The supplier invoice number is
    ///   already recorded for this supplier
    pub async fn register_purchase(&self, req: &PurchaseRequest) -> DbResult<PurchaseDetail> {
        req.validate()?;
        let supplier_invoice_number = req.supplier_invoice_number.trim().to_string();
        let active: Option<i64> = sqlx::query_scalar("SELECT id FROM suppliers WHERE id = ? AND deleted_at IS NULL")
            .bind(req.supplier_id)
            .fetch_optional(&self.pool)
            .await?;
        if active.is_none() {
            return Err(DbError::not_found("Supplier", req.supplier_id));
        }

        let mut tx = self.pool.begin().await?;

        let mut total = Money::zero();
        for line in &req.lines {
            let product: Product = lock_row(&mut tx, Table::Products, line.product_id).await?;
            record(
                &mut tx,
                NewStockOperation::new(product.id, StockOperationKind::Purchase, line.quantity, SYSTEM_SELLER_ID),
            )
            .await?;
            total = Money::from_cents(line.unit_cost_cents)
                .checked_mul_quantity(line.quantity)
                .and_then(|line_total| total.checked_add(line_total))
                .ok_or_else(|| ValidationError::OutOfRange {
                    field: "total".to_string(),
                })?;
        }

        let now = now_text();
        let purchase_id = sqlx::query(
            "INSERT INTO purchases (date, supplier_id, supplier_invoice_number, total_cents, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&now)
        .bind(req.supplier_id)
        .bind(&supplier_invoice_number)
        .bind(total.cents())
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for line in &req.lines {
            sqlx::query(
                "INSERT INTO purchase_lines (purchase_id, product_id, quantity, unit_cost_cents, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(purchase_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_cost_cents)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            purchase_id,
            supplier_id = req.supplier_id,
            total_cents = total.cents(),
            "Purchase registered"
        );

        self.purchase(purchase_id).await
    }

    pub async fn purchase(&self, id: i64) -> DbResult<PurchaseDetail> {
        let purchase = sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Purchase", id))?;
        self.detail(purchase).await
    }

    async fn detail(&self, purchase: Purchase) -> DbResult<PurchaseDetail> {
        let supplier = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = ?")
            .bind(purchase.supplier_id)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, PurchaseLine>(
            "SELECT * FROM purchase_lines WHERE purchase_id = ? AND deleted_at IS NULL ORDER BY id",
        )
        .bind(purchase.id)
        .fetch_all(&self.pool)
        .await?;

        let mut lines = Vec::with_capacity(rows.len());
        for line in rows {
            let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
                .bind(line.product_id)
                .fetch_one(&self.pool)
                .await?;
            lines.push(PurchaseLineDetail { line, product });
        }

        Ok(PurchaseDetail {
            purchase,
            supplier,
            lines,
        })
    }

    pub async fn paginated(&self, req: &PageRequest) -> DbResult<Page<Purchase>> {
        paginate(&self.pool, &LIST, req).await
    }

    pub async fn all_details(&self) -> DbResult<Vec<PurchaseDetail>> {
        let purchases = sqlx::query_as::<_, Purchase>("SELECT * FROM purchases ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        let mut details = Vec::with_capacity(purchases.len());
        for purchase in purchases {
            details.push(self.detail(purchase).await?);
        }
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use botica_core::{ProductData, PurchaseLineRequest, SupplierData};

    async fn setup() -> (Database, Supplier, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let supplier = db
            .suppliers()
            .register(&SupplierData {
                name: "Medisur".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let product = db
            .products()
            .register(&ProductData {
                name: "Ibuprofeno".to_string(),
                code: "A".to_string(),
                sale_price_cents: 500,
                stock: 5,
            })
            .await
            .unwrap();
        (db, supplier, product)
    }

    fn request(supplier: &Supplier, product: &Product, number: &str) -> PurchaseRequest {
        PurchaseRequest {
            supplier_id: supplier.id,
            supplier_invoice_number: number.to_string(),
            lines: vec![PurchaseLineRequest {
                product_id: product.id,
                quantity: 10,
                unit_cost_cents: 250,
            }],
        }
    }

    #[tokio::test]
    async fn test_purchase_then_normalize() {
        let (db, supplier, product) = setup().await;
        let detail = db.purchases().register_purchase(&request(&supplier, &product, "P-1")).await.unwrap();
        assert_eq!(detail.purchase.total_cents, 2500);
        assert_eq!(detail.supplier.name, "Medisur");
        assert_eq!(detail.lines[0].product.stock, 15);

        let latest = &db.ledger().history(product.id).await.unwrap()[0];
        assert_eq!(latest.kind, StockOperationKind::Purchase);
        assert_eq!(latest.quantity_delta, 10);
        assert_eq!(latest.resulting_stock, 15);
        assert_eq!(latest.seller_id, SYSTEM_SELLER_ID);

        sqlx::query("UPDATE products SET stock = 0 WHERE id = ?")
            .bind(product.id)
            .execute(db.pool())
            .await
            .unwrap();
        db.ledger().normalize_all().await.unwrap();
        assert_eq!(db.products().get(product.id).await.unwrap().stock, 15);
    }

    #[tokio::test]
    async fn test_overflowing_quantity_is_rejected() {
        let (db, supplier, product) = setup().await;
        let mut req = request(&supplier, &product, "P-9");
        req.lines[0].quantity = i64::MAX;

        let err = db.purchases().register_purchase(&req).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(ValidationError::OutOfRange { .. })));
        assert_eq!(db.products().get(product.id).await.unwrap().stock, 5);
        assert_eq!(db.ledger().history(product.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_supplier_invoice_rolls_back() {
        let (db, supplier, product) = setup().await;
        db.purchases().register_purchase(&request(&supplier, &product, "P-1")).await.unwrap();

        let err = db
            .purchases()
            .register_purchase(&request(&supplier, &product, "P-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(db.ledger().fold(product.id).await.unwrap(), 15);
        assert_eq!(db.products().get(product.id).await.unwrap().stock, 15);
    }
}
