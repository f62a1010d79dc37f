//! Smart-sync watermarks, one row per replicated model.

use botica_core::SyncLogEntry;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::timestamp::{parse_db_text, to_db_text};

#[derive(Debug, Clone)]
pub struct SyncLogRepository {
    pool: SqlitePool,
}

impl SyncLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SyncLogRepository { pool }
    }

    /// Last successful sync of `model`, `None` before the first run.
    pub async fn get(&self, model: &str) -> DbResult<Option<DateTime<Utc>>> {
        let text: Option<String> =
            sqlx::query_scalar("SELECT last_sync_timestamp FROM sync_log WHERE model_name = ?")
                .bind(model)
                .fetch_optional(&self.pool)
                .await?;
        text.as_deref().map(parse_db_text).transpose()
    }

    pub async fn set(&self, model: &str, at: DateTime<Utc>) -> DbResult<()> {
        debug!(model, at = %at, "Recording sync watermark");
        sqlx::query(
            "INSERT INTO sync_log (model_name, last_sync_timestamp) VALUES (?, ?) \
             ON CONFLICT(model_name) DO UPDATE SET last_sync_timestamp = excluded.last_sync_timestamp",
        )
        .bind(model)
        .bind(to_db_text(at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn entries(&self) -> DbResult<Vec<SyncLogEntry>> {
        let entries = sqlx::query_as::<_, SyncLogEntry>("SELECT * FROM sync_log ORDER BY model_name")
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_watermark_round_trip_and_overwrite() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let log = db.sync_log();
        assert!(log.get("products").await.unwrap().is_none());

        let first = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2025, 1, 2, 8, 0, 0).unwrap();
        log.set("products", first).await.unwrap();
        log.set("products", second).await.unwrap();

        assert_eq!(log.get("products").await.unwrap(), Some(second));
        assert_eq!(log.entries().await.unwrap().len(), 1);
    }
}
