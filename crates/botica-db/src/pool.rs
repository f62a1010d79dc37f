//! # Database Pool Management
//!
//! Connection pool, transactions and schema reset for the local store.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  DbConfig::new(path)                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config) ─► pool + migrations (fatal on failure)         │
//! │       │                                                                 │
//! │       ├── db.begin()      ─► Tx (rolls back on drop)                   │
//! │       ├── db.products()   ─► ProductRepository                         │
//! │       ├── db.ledger()     ─► LedgerRepository                          │
//! │       ├── db.sales()      ─► SaleRepository                            │
//! │       └── db.deep_reset() ─► drop everything, migrate again            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │  readers in parallel,     │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  one writer at a time     │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │  (busy timeout queues)    │
//! │  └─────────────────────────────────────────┘                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! Readers don't block the writer and the writer doesn't block readers. A
//! second writer waits up to `busy_timeout` for the first to commit.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::client::ClientRepository;
use crate::repository::ledger::LedgerRepository;
use crate::repository::product::ProductRepository;
use crate::repository::purchase::PurchaseRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::seller::SellerRepository;
use crate::repository::supplier::SupplierRepository;
use crate::repository::sync_log::SyncLogRepository;
use crate::table::Table;

/// A local transaction. Dropping it without `commit` rolls back.
pub type Tx = Transaction<'static, Sqlite>;

// =============================================================================
// Configuration
// =============================================================================

/// Local store configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/botica/botica.db").max_connections(5);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Created if it doesn't exist.
    pub database_path: PathBuf,

    /// Default: 5
    pub max_connections: u32,

    /// Default: 1
    pub min_connections: u32,

    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long a writer waits for the write lock. Default: 5 seconds
    pub busy_timeout: Duration,

    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// In-memory database for tests.
    ///
    /// Single connection: a transaction holds the whole store, so code under
    /// test must not open a second connection while one is running.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Local store handle. Cheap to clone; every clone shares the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the local store and migrates it.
    ///
    /// ## Returns
    /// * `Ok(Database)` - Ready-to-use handle
    /// * `Err(DbError)` - The process cannot start without its local store
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing local store"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(max_connections = config.max_connections, "Local pool created");

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub async fn migration_status(&self) -> DbResult<(usize, usize)> {
        migrations::migration_status(&self.pool).await
    }

    /// Opens a transaction. Drop without commit rolls back.
    pub async fn begin(&self) -> DbResult<Tx> {
        self.pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }

    /// Commits, mapping the failure to `TransactionFailed`.
    pub async fn commit(tx: Tx) -> DbResult<()> {
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }

    /// For queries not covered by a repository.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn sellers(&self) -> SellerRepository {
        SellerRepository::new(self.pool.clone())
    }

    pub fn clients(&self) -> ClientRepository {
        ClientRepository::new(self.pool.clone())
    }

    pub fn suppliers(&self) -> SupplierRepository {
        SupplierRepository::new(self.pool.clone())
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.pool.clone())
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    pub fn purchases(&self) -> PurchaseRepository {
        PurchaseRepository::new(self.pool.clone())
    }

    pub fn sync_log(&self) -> SyncLogRepository {
        SyncLogRepository::new(self.pool.clone())
    }

    /// Drops every table and re-creates the schema.
    ///
    /// ## What This Does
    /// 1. Switches foreign keys off on one connection
    /// 2. Drops tables in [`Table::RESET_ORDER`]
    /// 3. Clears `_sqlx_migrations`
    /// 4. Runs the migrations again (re-seeding the system seller)
    pub async fn deep_reset(&self) -> DbResult<()> {
        warn!("Deep reset of the local store requested");

        {
            let mut conn = self.pool.acquire().await?;
            sqlx::query("PRAGMA foreign_keys = OFF").execute(&mut *conn).await?;

            for table in Table::RESET_ORDER {
                debug!(table = %table, "Dropping table");
                let sql = format!("DROP TABLE IF EXISTS {}", table.name());
                sqlx::query(&sql).execute(&mut *conn).await?;
            }
            sqlx::query("DROP TABLE IF EXISTS _sqlx_migrations")
                .execute(&mut *conn)
                .await?;

            sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
        }

        self.run_migrations().await?;
        info!("Local store reset complete");
        Ok(())
    }

    pub async fn close(&self) {
        info!("Closing local store");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        let (total, applied) = db.migration_status().await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(applied, 2);
    }

    #[tokio::test]
    async fn test_system_seller_is_seeded() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let national_id: String = sqlx::query_scalar("SELECT national_id FROM sellers WHERE id = 1")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(national_id, "SYSTEM");
    }

    #[tokio::test]
    async fn test_deep_reset_empties_and_reseeds() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        sqlx::query("INSERT INTO products (name, code, sale_price_cents, stock) VALUES ('X', 'X', 1, 0)")
            .execute(db.pool())
            .await
            .unwrap();

        db.deep_reset().await.unwrap();

        let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(db.pool())
            .await
            .unwrap();
        let sellers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sellers")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(products, 0);
        assert_eq!(sellers, 1);
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/botica.db")
            .max_connections(10)
            .busy_timeout(Duration::from_secs(1));

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.busy_timeout, Duration::from_secs(1));
    }
}
