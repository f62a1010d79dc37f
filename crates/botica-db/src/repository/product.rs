//! # Product Repository
//!
//! Products never have their stock written directly. Registration and
//! edits carry a desired stock and the ledger supplies the entry that gets
//! there.
//!
//! ```text
//! register { code: "A", stock: 5 }
//!      │
//!      ├── INSERT products (stock = 0)
//!      └── adjust_to(5) ──► INITIAL +5 ──► products.stock = 5
//!
//! update { stock: 3 }      adjust_to(3) ──► ADJUST -2
//! ```

use botica_core::{Page, PageRequest, Product, ProductData, SYSTEM_SELLER_ID};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::lock::{claim_write_lock, lock_row};
use crate::repository::ledger::{adjust_to, fold_in};
use crate::repository::paging::{paginate, ListSpec};
use crate::table::Table;
use crate::timestamp::{now_text, to_db_text};

const LIST: ListSpec = ListSpec {
    table: Table::Products,
    search_columns: &["name", "code"],
    sort_keys: &[
        ("name", "name"),
        ("code", "code"),
        ("salePrice", "sale_price_cents"),
        ("stock", "stock"),
    ],
    default_sort: "name",
};

#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    pub async fn get(&self, id: i64) -> DbResult<Product> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    pub async fn get_any(&self, id: i64) -> DbResult<Product> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE code = ?")
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Creates a product, or restores the soft-deleted one with the same
    /// code, and brings it to `data.stock` through the ledger.
    pub async fn register(&self, data: &ProductData) -> DbResult<Product> {
        data.validate()?;
        let code = data.code.trim().to_string();

        let mut tx = self.pool.begin().await?;
        claim_write_lock(&mut tx).await?;

        let existing: Option<(i64, Option<String>)> =
            sqlx::query_as("SELECT id, deleted_at FROM products WHERE code = ?")
                .bind(&code)
                .fetch_optional(&mut *tx)
                .await?;

        let now = now_text();
        let id = match existing {
            Some((_, None)) => return Err(DbError::duplicate("code", code)),
            Some((id, Some(_))) => {
                info!(product_id = id, code = %code, "Restoring soft-deleted product");
                sqlx::query(
                    "UPDATE products SET name = ?, sale_price_cents = ?, deleted_at = NULL, updated_at = ? WHERE id = ?",
                )
                .bind(data.name.trim())
                .bind(data.sale_price_cents)
                .bind(&now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                id
            }
            None => sqlx::query(
                "INSERT INTO products (name, code, sale_price_cents, stock, created_at, updated_at) \
                 VALUES (?, ?, ?, 0, ?, ?)",
            )
            .bind(data.name.trim())
            .bind(&code)
            .bind(data.sale_price_cents)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid(),
        };

        adjust_to(&mut tx, id, data.stock, SYSTEM_SELLER_ID).await?;

        tx.commit().await?;
        debug!(product_id = id, stock = data.stock, "Product registered");
        self.get(id).await
    }

    /// Edits name, code and price. A stock different from the fold becomes
    /// an ADJUST entry by `seller_id`.
    pub async fn update(&self, id: i64, data: &ProductData, seller_id: i64) -> DbResult<Product> {
        data.validate()?;
        let code = data.code.trim().to_string();

        let mut tx = self.pool.begin().await?;
        lock_row::<Product>(&mut tx, Table::Products, id).await?;

        let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM products WHERE code = ? AND id != ?")
            .bind(&code)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if taken.is_some() {
            return Err(DbError::duplicate("code", code));
        }

        sqlx::query("UPDATE products SET name = ?, code = ?, sale_price_cents = ?, updated_at = ? WHERE id = ?")
            .bind(data.name.trim())
            .bind(&code)
            .bind(data.sale_price_cents)
            .bind(now_text())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        adjust_to(&mut tx, id, data.stock, seller_id).await?;

        tx.commit().await?;
        self.get(id).await
    }

    pub async fn soft_delete(&self, id: i64) -> DbResult<()> {
        let now = now_text();
        let result = sqlx::query(
            "UPDATE products SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Paginated listing with `stock` replaced by the live ledger fold.
    pub async fn paginated(&self, req: &PageRequest) -> DbResult<Page<Product>> {
        let mut page: Page<Product> = paginate(&self.pool, &LIST, req).await?;
        let mut conn = self.pool.acquire().await?;
        for product in &mut page.records {
            product.stock = fold_in(&mut conn, product.id).await?;
        }
        Ok(page)
    }

    pub async fn all(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    pub async fn updated_between(
        &self,
        since: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE (? IS NULL OR updated_at > ?) AND updated_at <= ? ORDER BY id",
        )
        .bind(since.map(to_db_text))
        .bind(since.map(to_db_text))
        .bind(to_db_text(until))
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use botica_core::{SortOrder, StockOperationKind};

    fn product(code: &str, price: i64, stock: i64) -> ProductData {
        ProductData {
            name: format!("Product {}", code),
            code: code.to_string(),
            sale_price_cents: price,
            stock,
        }
    }

    #[tokio::test]
    async fn test_register_goes_through_ledger() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let created = db.products().register(&product("A", 100, 5)).await.unwrap();
        assert_eq!(created.stock, 5);

        let history = db.ledger().history(created.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, StockOperationKind::Initial);
        assert_eq!(history[0].seller_id, SYSTEM_SELLER_ID);

        let empty = db.products().register(&product("B", 100, 0)).await.unwrap();
        assert!(db.ledger().history(empty.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_adjusts_towards_requested_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let created = db.products().register(&product("A", 100, 5)).await.unwrap();

        let updated = db
            .products()
            .update(created.id, &product("A", 250, 2), SYSTEM_SELLER_ID)
            .await
            .unwrap();
        assert_eq!(updated.sale_price_cents, 250);
        assert_eq!(updated.stock, 2);

        let history = db.ledger().history(created.id).await.unwrap();
        assert_eq!(history[0].kind, StockOperationKind::Adjust);
        assert_eq!(history[0].quantity_delta, -3);
    }

    #[tokio::test]
    async fn test_listing_reads_stock_from_ledger() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let a = db.products().register(&product("A", 300, 4)).await.unwrap();
        db.products().register(&product("B", 100, 1)).await.unwrap();
        sqlx::query("UPDATE products SET stock = 99 WHERE id = ?")
            .bind(a.id)
            .execute(db.pool())
            .await
            .unwrap();

        let page = db
            .products()
            .paginated(&PageRequest::new(1, 10).sort("salePrice", SortOrder::Desc))
            .await
            .unwrap();
        assert_eq!(page.total_records, 2);
        assert_eq!(page.records[0].code, "A");
        assert_eq!(page.records[0].stock, 4);
    }

    #[tokio::test]
    async fn test_restore_by_code_keeps_ledger() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let created = db.products().register(&product("A", 100, 5)).await.unwrap();
        db.products().soft_delete(created.id).await.unwrap();
        assert!(matches!(db.products().soft_delete(created.id).await, Err(DbError::NotFound { .. })));

        let restored = db.products().register(&product("A", 120, 8)).await.unwrap();
        assert_eq!(restored.id, created.id);
        assert_eq!(restored.stock, 8);
        assert_eq!(db.ledger().fold(created.id).await.unwrap(), 8);
    }
}
