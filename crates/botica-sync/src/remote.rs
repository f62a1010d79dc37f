//! # Remote Store
//!
//! Shared SQL database behind `DATABASE_URL`, reached through `AnyPool`.
//!
//! ## Availability
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  connect(url)                                                           │
//! │    ├── no url ──────────────────┐                                       │
//! │    ├── bad url / connect fails ─┼──► OFFLINE for the whole process      │
//! │    ├── schema setup fails ──────┘                                       │
//! │    └── ok ──► ONLINE pool                                               │
//! │                                                                         │
//! │  before every dispatch: SELECT 1 within ping_timeout                    │
//! │    ├── answers ──► run the push                                          │
//! │    └── silent  ──► skip, log, try again on the next mutation             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use botica_db::upsert::{bind_all, build_upsert, ConflictPolicy, UpsertRow};
use botica_db::Table;
use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::{Any, AnyConnection, AnyPool};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};
use crate::schema::{create_statements, seed_system_seller, Dialect, DROP_ORDER};

/// Default availability probe timeout.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug)]
struct Connected {
    pool: AnyPool,
    dialect: Dialect,
}

/// Handle to the remote store. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    connected: Option<Arc<Connected>>,
    online: Arc<AtomicBool>,
    ping_timeout: Duration,
}

impl RemoteStore {
    /// A store that is never available.
    pub fn offline() -> Self {
        RemoteStore {
            connected: None,
            online: Arc::new(AtomicBool::new(false)),
            ping_timeout: DEFAULT_PING_TIMEOUT,
        }
    }

    /// Opens the remote store and creates its schema.
    ///
    /// Never fails: any startup problem is logged and yields an offline
    /// store, and the application keeps working locally.
    pub async fn connect(url: Option<&str>, ping_timeout: Duration) -> Self {
        let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            info!("No remote store configured, running offline");
            return Self::offline();
        };

        match Self::open(url, ping_timeout).await {
            Ok(connected) => {
                info!(remote = %redact(url), "Remote store online");
                RemoteStore {
                    connected: Some(Arc::new(connected)),
                    online: Arc::new(AtomicBool::new(true)),
                    ping_timeout,
                }
            }
            Err(e) => {
                warn!(remote = %redact(url), error = %e, "Remote store unreachable, running offline");
                RemoteStore {
                    ping_timeout,
                    ..Self::offline()
                }
            }
        }
    }

    async fn open(url: &str, ping_timeout: Duration) -> SyncResult<Connected> {
        let parsed = Url::parse(url)?;
        let dialect = Dialect::from_scheme(parsed.scheme())
            .ok_or_else(|| SyncError::InvalidUrl(format!("unsupported scheme '{}'", parsed.scheme())))?;

        install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(ping_timeout.max(Duration::from_secs(1)))
            .connect(url)
            .await?;

        let connected = Connected { pool, dialect };
        create_schema(&connected).await?;
        Ok(connected)
    }

    /// Whether a pool exists at all.
    pub fn is_configured(&self) -> bool {
        self.connected.is_some()
    }

    /// Result of the last probe.
    pub fn is_online(&self) -> bool {
        self.connected.is_some() && self.online.load(Ordering::Relaxed)
    }

    /// Probes the remote with `SELECT 1` inside the ping timeout.
    pub async fn check(&self) -> SyncResult<&AnyPool> {
        let connected = self.connected.as_ref().ok_or(SyncError::Offline)?;

        let probe = sqlx::query("SELECT 1").execute(&connected.pool);
        let outcome = match tokio::time::timeout(self.ping_timeout, probe).await {
            Ok(Ok(_)) => Ok(&connected.pool),
            Ok(Err(e)) => Err(SyncError::Unavailable(e.to_string())),
            Err(_) => Err(SyncError::Timeout(self.ping_timeout.as_secs())),
        };

        let online = outcome.is_ok();
        if self.online.swap(online, Ordering::Relaxed) != online {
            if online {
                info!("Remote store reachable again");
            } else {
                warn!("Remote store stopped answering");
            }
        }
        outcome
    }

    pub fn dialect(&self) -> Option<Dialect> {
        self.connected.as_ref().map(|c| c.dialect)
    }

    /// Drops and re-creates every remote table.
    pub async fn reset(&self) -> SyncResult<()> {
        self.check().await?;
        let connected = self.connected.as_ref().ok_or(SyncError::Offline)?;
        warn!("Resetting remote store");
        for table in DROP_ORDER {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
                .execute(&connected.pool)
                .await?;
        }
        create_schema(connected).await
    }

    pub async fn close(&self) {
        if let Some(connected) = &self.connected {
            connected.pool.close().await;
        }
    }
}

async fn create_schema(connected: &Connected) -> SyncResult<()> {
    for sql in create_statements(connected.dialect) {
        sqlx::query(&sql).execute(&connected.pool).await?;
    }
    sqlx::query(&seed_system_seller(connected.dialect))
        .execute(&connected.pool)
        .await?;
    debug!(dialect = ?connected.dialect, "Remote schema ready");
    Ok(())
}

/// Upserts rows into a remote table, one statement per row.
///
/// ## Returns
/// Rows inserted or updated; skipped conflicts do not count.
pub async fn upsert_remote(
    conn: &mut AnyConnection,
    table: Table,
    rows: &[UpsertRow],
    policy: &ConflictPolicy,
) -> SyncResult<u64> {
    let mut affected = 0;
    for row in rows {
        let stmt = build_upsert(table.name(), row, policy);
        let result = bind_all(sqlx::query::<Any>(&stmt.sql), &stmt.binds)
            .execute(&mut *conn)
            .await?;
        affected += result.rows_affected();
    }
    Ok(affected)
}

/// `scheme://host[:port]` of a connection string. Credentials, path and
/// query never reach the logs.
pub fn redact(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{}://{}:{}", parsed.scheme(), host, port),
            (Some(host), None) => format!("{}://{}", parsed.scheme(), host),
            (None, _) => format!("{}://", parsed.scheme()),
        },
        Err(_) => "<unparseable url>".to_string(),
    }
}
