//! # Seller Repository
//!
//! Staff accounts. Passwords arrive already hashed; hashing and
//! verification belong to the backend's auth module.
//!
//! ## Register (restore-on-conflict)
//! ```text
//! register(national_id = N, email = E)
//!      │
//!      ▼
//! rows WHERE national_id = N OR email = E
//!      │
//!      ├── any active      ──► DUPLICATE_KEY (nationalId / email)
//!      ├── two deleted     ──► DUPLICATE_KEY (email held by the other row)
//!      ├── one deleted     ──► reactivate that row with the new fields
//!      └── none            ──► INSERT
//! ```

use botica_core::validation::normalize_email;
use botica_core::{Page, PageRequest, Seller, SellerUpdate, SYSTEM_SELLER_ID, SYSTEM_SELLER_NATIONAL_ID};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::lock::{claim_write_lock, lock_row};
use crate::repository::paging::{paginate, ListSpec};
use crate::table::Table;
use crate::timestamp::{now_text, to_db_text};

const LIST: ListSpec = ListSpec {
    table: Table::Sellers,
    search_columns: &["name", "last_name", "national_id"],
    sort_keys: &[
        ("name", "name"),
        ("lastName", "last_name"),
        ("nationalId", "national_id"),
        ("email", "email"),
    ],
    default_sort: "name",
};

/// Seller fields for registration, password already hashed.
#[derive(Debug, Clone)]
pub struct SellerRecord {
    pub name: String,
    pub last_name: String,
    pub national_id: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct SellerRepository {
    pool: SqlitePool,
}

impl SellerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SellerRepository { pool }
    }

    /// Active seller by id.
    pub async fn get(&self, id: i64) -> DbResult<Seller> {
        sqlx::query_as::<_, Seller>("SELECT * FROM sellers WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Seller", id))
    }

    /// Seller by id, soft-deleted or not. Invoices keep pointing at
    /// deleted sellers.
    pub async fn get_any(&self, id: i64) -> DbResult<Seller> {
        sqlx::query_as::<_, Seller>("SELECT * FROM sellers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Seller", id))
    }

    pub async fn find_by_email(&self, email: &str) -> DbResult<Option<Seller>> {
        let seller = sqlx::query_as::<_, Seller>(
            "SELECT * FROM sellers WHERE email = ? AND deleted_at IS NULL",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;
        Ok(seller)
    }

    pub async fn find_by_national_id(&self, national_id: &str) -> DbResult<Option<Seller>> {
        let seller = sqlx::query_as::<_, Seller>("SELECT * FROM sellers WHERE national_id = ?")
            .bind(national_id.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(seller)
    }

    /// Creates a seller or restores a soft-deleted one with the same
    /// national id or email.
    ///
    /// ## Returns
    /// * `Ok(Seller)` - The new or reactivated row
    /// * `Err(DbError::UniqueViolation)` - An active row holds the key, or
    ///   the national id and the email belong to two different deleted rows
    pub async fn register(&self, record: SellerRecord) -> DbResult<Seller> {
        let national_id = record.national_id.trim().to_string();
        let email = normalize_email(&record.email);

        let mut tx = self.pool.begin().await?;
        claim_write_lock(&mut tx).await?;

        let matches: Vec<(i64, String, Option<String>)> = sqlx::query_as(
            "SELECT id, national_id, deleted_at FROM sellers WHERE national_id = ? OR email = ? \
             ORDER BY (national_id = ?) DESC, id ASC",
        )
        .bind(&national_id)
        .bind(&email)
        .bind(&national_id)
        .fetch_all(&mut *tx)
        .await?;

        if let Some((_, matched_id, _)) = matches.iter().find(|(_, _, deleted)| deleted.is_none()) {
            return Err(if *matched_id == national_id {
                DbError::duplicate("nationalId", national_id)
            } else {
                DbError::duplicate("email", email)
            });
        }

        if let [(restorable, _, _), (holder, _, _)] = matches.as_slice() {
            warn!(
                seller_id = *restorable,
                email_holder = *holder,
                "Email belongs to another deleted seller"
            );
            return Err(DbError::duplicate("email", email));
        }

        let now = now_text();
        let id = match matches.first() {
            Some((restored, _, _)) => {
                info!(seller_id = *restored, "Restoring soft-deleted seller");
                sqlx::query(
                    "UPDATE sellers SET name = ?, last_name = ?, national_id = ?, email = ?, \
                     password_hash = ?, deleted_at = NULL, updated_at = ? WHERE id = ?",
                )
                .bind(record.name.trim())
                .bind(record.last_name.trim())
                .bind(&national_id)
                .bind(&email)
                .bind(&record.password_hash)
                .bind(&now)
                .bind(*restored)
                .execute(&mut *tx)
                .await?;
                *restored
            }
            None => sqlx::query(
                "INSERT INTO sellers (name, last_name, national_id, email, password_hash, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(record.name.trim())
            .bind(record.last_name.trim())
            .bind(&national_id)
            .bind(&email)
            .bind(&record.password_hash)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid(),
        };

        tx.commit().await?;
        debug!(seller_id = id, "Seller registered");
        self.get(id).await
    }

    /// Admin edit of the profile fields. Credentials untouched.
    pub async fn update(&self, id: i64, update: &SellerUpdate) -> DbResult<Seller> {
        self.update_profile(id, update, None).await
    }

    /// Profile fields plus an optional new password hash, in one transaction.
    /// A taken key leaves the row untouched, password included.
    pub async fn update_profile(
        &self,
        id: i64,
        update: &SellerUpdate,
        password_hash: Option<&str>,
    ) -> DbResult<Seller> {
        update.validate()?;
        let national_id = update.national_id.trim().to_string();
        let email = normalize_email(&update.email);

        let mut tx = self.pool.begin().await?;
        lock_row::<Seller>(&mut tx, Table::Sellers, id).await?;

        let taken: Option<(String,)> = sqlx::query_as(
            "SELECT national_id FROM sellers WHERE id != ? AND (national_id = ? OR email = ?) LIMIT 1",
        )
        .bind(id)
        .bind(&national_id)
        .bind(&email)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some((other,)) = taken {
            return Err(if other == national_id {
                DbError::duplicate("nationalId", national_id)
            } else {
                DbError::duplicate("email", email)
            });
        }

        sqlx::query(
            "UPDATE sellers SET name = ?, last_name = ?, national_id = ?, email = ?, \
             password_hash = COALESCE(?, password_hash), updated_at = ? WHERE id = ?",
        )
        .bind(update.name.trim())
        .bind(update.last_name.trim())
        .bind(&national_id)
        .bind(&email)
        .bind(password_hash)
        .bind(now_text())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        if password_hash.is_some() {
            info!(seller_id = id, "Seller password changed");
        }
        self.get(id).await
    }

    /// ## Returns
    /// `Err(DbError::NotFound)` when missing or already deleted.
    pub async fn soft_delete(&self, id: i64) -> DbResult<()> {
        if id == SYSTEM_SELLER_ID {
            return Err(DbError::Rule("the system seller cannot be deleted".to_string()));
        }
        let now = now_text();
        let result = sqlx::query(
            "UPDATE sellers SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Seller", id));
        }
        info!(seller_id = id, "Seller soft-deleted");
        Ok(())
    }

    pub async fn paginated(&self, req: &PageRequest) -> DbResult<Page<Seller>> {
        paginate(&self.pool, &LIST, req).await
    }

    /// Active sellers other than the system actor. Drives the direction of
    /// the initial reconciliation.
    pub async fn count_business(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sellers WHERE deleted_at IS NULL AND national_id != ?",
        )
        .bind(SYSTEM_SELLER_NATIONAL_ID)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Every seller except the system actor, deleted ones included.
    pub async fn all_business(&self) -> DbResult<Vec<Seller>> {
        let sellers = sqlx::query_as::<_, Seller>("SELECT * FROM sellers WHERE national_id != ? ORDER BY id")
            .bind(SYSTEM_SELLER_NATIONAL_ID)
            .fetch_all(&self.pool)
            .await?;
        Ok(sellers)
    }

    /// Sellers changed in `(since, until]`, or all up to `until` without a
    /// lower bound.
    pub async fn updated_between(
        &self,
        since: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> DbResult<Vec<Seller>> {
        let sellers = sqlx::query_as::<_, Seller>(
            "SELECT * FROM sellers WHERE national_id != ? AND (? IS NULL OR updated_at > ?) \
             AND updated_at <= ? ORDER BY id",
        )
        .bind(SYSTEM_SELLER_NATIONAL_ID)
        .bind(since.map(to_db_text))
        .bind(since.map(to_db_text))
        .bind(to_db_text(until))
        .fetch_all(&self.pool)
        .await?;
        Ok(sellers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn record(national_id: &str, email: &str, name: &str) -> SellerRecord {
        SellerRecord {
            name: name.to_string(),
            last_name: "Ruiz".to_string(),
            national_id: national_id.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    async fn repo() -> SellerRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().sellers()
    }

    #[tokio::test]
    async fn test_register_lowercases_email() {
        let sellers = repo().await;
        let seller = sellers.register(record("100", " Ana@Botica.CO ", "Ana")).await.unwrap();
        assert_eq!(seller.email, "ana@botica.co");
        assert!(sellers.find_by_email("ANA@botica.co").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_register_duplicate_active_fails() {
        let sellers = repo().await;
        sellers.register(record("100", "ana@botica.co", "Ana")).await.unwrap();

        let err = sellers.register(record("100", "other@botica.co", "Otra")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "nationalId"));

        let err = sellers.register(record("200", "ana@botica.co", "Otra")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "email"));
    }

    #[tokio::test]
    async fn test_register_restores_soft_deleted_by_email() {
        let sellers = repo().await;
        let original = sellers.register(record("100", "ana@botica.co", "Ana")).await.unwrap();
        sellers.soft_delete(original.id).await.unwrap();

        let restored = sellers.register(record("300", "ana@botica.co", "Ana Maria")).await.unwrap();
        assert_eq!(restored.id, original.id);
        assert_eq!(restored.national_id, "300");
        assert_eq!(restored.name, "Ana Maria");
        assert!(restored.deleted_at.is_none());

        assert!(sellers.register(record("300", "x@botica.co", "Dup")).await.is_err());
    }

    #[tokio::test]
    async fn test_soft_delete_twice_is_not_found() {
        let sellers = repo().await;
        let seller = sellers.register(record("100", "ana@botica.co", "Ana")).await.unwrap();
        sellers.soft_delete(seller.id).await.unwrap();
        assert!(matches!(sellers.soft_delete(seller.id).await, Err(DbError::NotFound { .. })));
        assert!(matches!(sellers.get(seller.id).await, Err(DbError::NotFound { .. })));
        assert!(sellers.get_any(seller.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_count_business_ignores_system_seller() {
        let sellers = repo().await;
        assert_eq!(sellers.count_business().await.unwrap(), 0);
        sellers.register(record("100", "ana@botica.co", "Ana")).await.unwrap();
        assert_eq!(sellers.count_business().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_rejects_taken_email() {
        let sellers = repo().await;
        sellers.register(record("100", "ana@botica.co", "Ana")).await.unwrap();
        let luis = sellers.register(record("200", "luis@botica.co", "Luis")).await.unwrap();

        let update = SellerUpdate {
            name: "Luis".into(),
            last_name: "Mora".into(),
            national_id: "200".into(),
            email: "ANA@botica.co".into(),
        };
        assert!(matches!(
            sellers.update(luis.id, &update).await,
            Err(DbError::UniqueViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_register_split_between_two_deleted_rows() {
        let sellers = repo().await;
        let first = sellers.register(record("100", "ana@botica.co", "Ana")).await.unwrap();
        let second = sellers.register(record("200", "luis@botica.co", "Luis")).await.unwrap();
        sellers.soft_delete(first.id).await.unwrap();
        sellers.soft_delete(second.id).await.unwrap();

        let err = sellers.register(record("100", "luis@botica.co", "Ana")).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::UniqueViolation { ref field, ref value } if field == "email" && value == "luis@botica.co"
        ));
        assert!(sellers.get(first.id).await.is_err());
        assert!(sellers.get(second.id).await.is_err());

        // Each key alone still restores its own row.
        let restored = sellers.register(record("100", "ana@botica.co", "Ana")).await.unwrap();
        assert_eq!(restored.id, first.id);
    }

    #[tokio::test]
    async fn test_failed_profile_update_keeps_the_password() {
        let sellers = repo().await;
        sellers.register(record("100", "ana@botica.co", "Ana")).await.unwrap();
        let luis = sellers.register(record("200", "luis@botica.co", "Luis")).await.unwrap();

        let mut update = SellerUpdate {
            name: "Luis".into(),
            last_name: "Mora".into(),
            national_id: "200".into(),
            email: "ana@botica.co".into(),
        };
        let err = sellers.update_profile(luis.id, &update, Some("new-hash")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(sellers.get(luis.id).await.unwrap().password_hash, "hash");

        update.email = "luis@botica.co".into();
        let updated = sellers.update_profile(luis.id, &update, Some("new-hash")).await.unwrap();
        assert_eq!(updated.password_hash, "new-hash");
        assert_eq!(updated.last_name, "Mora");

        let kept = sellers.update(luis.id, &update).await.unwrap();
        assert_eq!(kept.password_hash, "new-hash");
    }
}
