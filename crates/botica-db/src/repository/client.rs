//! # Client Repository
//!
//! Customers identified by `id_number`. Registration restores a
//! soft-deleted client with the same id number instead of failing.

use botica_core::{Client, ClientData, Page, PageRequest};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::lock::{claim_write_lock, lock_row};
use crate::repository::paging::{paginate, ListSpec};
use crate::table::Table;
use crate::timestamp::{now_text, to_db_text};

const LIST: ListSpec = ListSpec {
    table: Table::Clients,
    search_columns: &["name", "last_name", "id_number"],
    sort_keys: &[
        ("name", "name"),
        ("lastName", "last_name"),
        ("idNumber", "id_number"),
        ("email", "email"),
    ],
    default_sort: "name",
};

#[derive(Debug, Clone)]
pub struct ClientRepository {
    pool: SqlitePool,
}

impl ClientRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ClientRepository { pool }
    }

    pub async fn get(&self, id: i64) -> DbResult<Client> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Client", id))
    }

    pub async fn get_any(&self, id: i64) -> DbResult<Client> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Client", id))
    }

    pub async fn find_by_id_number(&self, id_number: &str) -> DbResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id_number = ?")
            .bind(id_number.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(client)
    }

    /// Creates a client or reactivates the soft-deleted one holding the
    /// same id number.
    pub async fn register(&self, data: &ClientData) -> DbResult<Client> {
        data.validate()?;
        let id_number = data.id_number.trim().to_string();

        let mut tx = self.pool.begin().await?;
        claim_write_lock(&mut tx).await?;

        let existing: Option<(i64, Option<String>)> =
            sqlx::query_as("SELECT id, deleted_at FROM clients WHERE id_number = ?")
                .bind(&id_number)
                .fetch_optional(&mut *tx)
                .await?;

        let now = now_text();
        let id = match existing {
            Some((_, None)) => return Err(DbError::duplicate("idNumber", id_number)),
            Some((id, Some(_))) => {
                info!(client_id = id, "Restoring soft-deleted client");
                sqlx::query(
                    "UPDATE clients SET name = ?, last_name = ?, id_type = ?, phone = ?, email = ?, \
                     address = ?, deleted_at = NULL, updated_at = ? WHERE id = ?",
                )
                .bind(data.name.trim())
                .bind(data.last_name.trim())
                .bind(data.id_type.trim())
                .bind(data.phone.trim())
                .bind(data.email.trim())
                .bind(data.address.trim())
                .bind(&now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                id
            }
            None => sqlx::query(
                "INSERT INTO clients (name, last_name, id_type, id_number, phone, email, address, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(data.name.trim())
            .bind(data.last_name.trim())
            .bind(data.id_type.trim())
            .bind(&id_number)
            .bind(data.phone.trim())
            .bind(data.email.trim())
            .bind(data.address.trim())
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid(),
        };

        tx.commit().await?;
        self.get(id).await
    }

    pub async fn update(&self, id: i64, data: &ClientData) -> DbResult<Client> {
        data.validate()?;
        let id_number = data.id_number.trim().to_string();

        let mut tx = self.pool.begin().await?;
        lock_row::<Client>(&mut tx, Table::Clients, id).await?;

        let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM clients WHERE id_number = ? AND id != ?")
            .bind(&id_number)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if taken.is_some() {
            return Err(DbError::duplicate("idNumber", id_number));
        }

        sqlx::query(
            "UPDATE clients SET name = ?, last_name = ?, id_type = ?, id_number = ?, phone = ?, \
             email = ?, address = ?, updated_at = ? WHERE id = ?",
        )
        .bind(data.name.trim())
        .bind(data.last_name.trim())
        .bind(data.id_type.trim())
        .bind(&id_number)
        .bind(data.phone.trim())
        .bind(data.email.trim())
        .bind(data.address.trim())
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
            "UPDATE clients SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Client", id));
        }
        Ok(())
    }

    pub async fn paginated(&self, req: &PageRequest) -> DbResult<Page<Client>> {
        paginate(&self.pool, &LIST, req).await
    }

    pub async fn all(&self) -> DbResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>("SELECT * FROM clients ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(clients)
    }

    pub async fn updated_between(
        &self,
        since: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> DbResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(
            "SELECT * FROM clients WHERE (? IS NULL OR updated_at > ?) AND updated_at <= ? ORDER BY id",
        )
        .bind(since.map(to_db_text))
        .bind(since.map(to_db_text))
        .bind(to_db_text(until))
        .fetch_all(&self.pool)
        .await?;
        Ok(clients)
    }
}
