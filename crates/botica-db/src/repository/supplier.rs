//! Suppliers, keyed by name. A soft-deleted supplier is restored when
//! registered again.

use botica_core::{Page, PageRequest, Supplier, SupplierData};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::lock::{claim_write_lock, lock_row};
use crate::repository::paging::{paginate, ListSpec};
use crate::table::Table;
use crate::timestamp::{now_text, to_db_text};

const LIST: ListSpec = ListSpec {
    table: Table::Suppliers,
    search_columns: &["name", "email", "phone"],
    sort_keys: &[("name", "name"), ("email", "email")],
    default_sort: "name",
};

#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    pub async fn get(&self, id: i64) -> DbResult<Supplier> {
        sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Supplier", id))
    }

    pub async fn get_any(&self, id: i64) -> DbResult<Supplier> {
        sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Supplier", id))
    }

    pub async fn register(&self, data: &SupplierData) -> DbResult<Supplier> {
        data.validate()?;
        let name = data.name.trim().to_string();

        let mut tx = self.pool.begin().await?;
        claim_write_lock(&mut tx).await?;

        let existing: Option<(i64, Option<String>)> =
            sqlx::query_as("SELECT id, deleted_at FROM suppliers WHERE name = ?")
                .bind(&name)
                .fetch_optional(&mut *tx)
                .await?;

        let now = now_text();
        let id = match existing {
            Some((_, None)) => return Err(DbError::duplicate("name", name)),
            Some((id, Some(_))) => {
                info!(supplier_id = id, "Restoring soft-deleted supplier");
                sqlx::query(
                    "UPDATE suppliers SET phone = ?, email = ?, deleted_at = NULL, updated_at = ? WHERE id = ?",
                )
                .bind(data.phone.trim())
                .bind(data.email.trim())
                .bind(&now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                id
            }
            None => sqlx::query(
                "INSERT INTO suppliers (name, phone, email, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&name)
            .bind(data.phone.trim())
            .bind(data.email.trim())
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid(),
        };

        tx.commit().await?;
        self.get(id).await
    }

    pub async fn update(&self, id: i64, data: &SupplierData) -> DbResult<Supplier> {
        data.validate()?;
        let name = data.name.trim().to_string();

        let mut tx = self.pool.begin().await?;
        lock_row::<Supplier>(&mut tx, Table::Suppliers, id).await?;

        let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM suppliers WHERE name = ? AND id != ?")
            .bind(&name)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if taken.is_some() {
            return Err(DbError::duplicate("name", name));
        }

        sqlx::query("UPDATE suppliers SET name = ?, phone = ?, email = ?, updated_at = ? WHERE id = ?")
            .bind(&name)
            .bind(data.phone.trim())
            .bind(data.email.trim())
            .bind(now_text())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.get(id).await
    }

    pub async fn soft_delete(&self, id: i64) -> DbResult<()> {
        let now = now_text();
        let result = sqlx::query(
            "UPDATE suppliers SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Supplier", id));
        }
        Ok(())
    }

    pub async fn paginated(&self, req: &PageRequest) -> DbResult<Page<Supplier>> {
        paginate(&self.pool, &LIST, req).await
    }

    pub async fn all(&self) -> DbResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(suppliers)
    }

    pub async fn updated_between(
        &self,
        since: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> DbResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>(
            "SELECT * FROM suppliers WHERE (? IS NULL OR updated_at > ?) AND updated_at <= ? ORDER BY id",
        )
        .bind(since.map(to_db_text))
        .bind(since.map(to_db_text))
        .bind(to_db_text(until))
        .fetch_all(&self.pool)
        .await?;
        Ok(suppliers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn supplier(name: &str, phone: &str) -> SupplierData {
        SupplierData {
            name: name.to_string(),
            phone: phone.to_string(),
            email: String::new(),
        }
    }

    #[tokio::test]
    async fn test_register_restores_by_name() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let suppliers = db.suppliers();

        let first = suppliers.register(&supplier("Medisur", "111")).await.unwrap();
        assert!(matches!(
            suppliers.register(&supplier("Medisur", "222")).await,
            Err(DbError::UniqueViolation { .. })
        ));

        suppliers.soft_delete(first.id).await.unwrap();
        assert!(matches!(suppliers.get(first.id).await, Err(DbError::NotFound { .. })));

        let restored = suppliers.register(&supplier("Medisur", "333")).await.unwrap();
        assert_eq!(restored.id, first.id);
        assert_eq!(restored.phone, "333");
        assert!(restored.deleted_at.is_none());
    }

    #[tokio::test]
    async fn test_search_by_phone() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let suppliers = db.suppliers();
        suppliers.register(&supplier("Alfa", "555-01")).await.unwrap();
        suppliers.register(&supplier("Beta", "777-02")).await.unwrap();

        let page = suppliers.paginated(&PageRequest::new(1, 10).search("777")).await.unwrap();
        assert_eq!(page.total_records, 1);
        assert_eq!(page.records[0].name, "Beta");
    }
}
