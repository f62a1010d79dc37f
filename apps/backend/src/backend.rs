//! # Backend
//!
//! Composition root. Holds the two store handles, the replication agent
//! and the token service; the facade methods live in [`crate::services`].
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  AppConfig::load()                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(db_path)            ── failure is fatal                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  RemoteStore::connect(DATABASE_URL) ── failure means offline mode       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ReplicationAgent::new ──► spawn_reconcile() (not awaited)              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use botica_db::{Database, DbConfig};
use botica_sync::{ReconcileReport, ReplicationAgent, RemoteStore};
use tokio::task::JoinHandle;
use tracing::info;

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone)]
pub struct Backend {
    pub(crate) db: Database,
    pub(crate) agent: ReplicationAgent,
    pub(crate) tokens: TokenService,
    pub(crate) config: Arc<AppConfig>,
}

impl Backend {
    /// Opens both stores. Does not reconcile.
    pub async fn open(config: AppConfig) -> ApiResult<Self> {
        if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ApiError::internal(format!("Cannot create {}: {}", parent.display(), e)))?;
        }
        let db = Database::new(DbConfig::new(&config.db_path)).await?;
        let remote = RemoteStore::connect(config.database_url.as_deref(), config.remote_ping_timeout).await;
        Ok(Self::with_stores(config, db, remote))
    }

    /// Opens both stores and starts the initial reconcile in the background.
    pub async fn start(config: AppConfig) -> ApiResult<Self> {
        let backend = Self::open(config).await?;
        backend.reconcile_in_background();
        Ok(backend)
    }

    pub fn with_stores(config: AppConfig, db: Database, remote: RemoteStore) -> Self {
        info!(
            online = remote.is_online(),
            vat_bps = config.vat_rate.bps(),
            "Backend ready"
        );
        Backend {
            agent: ReplicationAgent::new(db.clone(), remote),
            tokens: TokenService::new(&config.jwt_secret),
            config: Arc::new(config),
            db,
        }
    }

    /// `None` when offline.
    pub fn reconcile_in_background(&self) -> Option<JoinHandle<Option<ReconcileReport>>> {
        self.agent.spawn_reconcile()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn agent(&self) -> &ReplicationAgent {
        &self.agent
    }

    /// Stops background pushes, then closes both stores.
    pub async fn shutdown(&self) {
        self.agent.shutdown().await;
        self.db.close().await;
        info!("Backend stopped");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use botica_core::{NewSeller, TaxRate};
    use std::path::PathBuf;
    use std::time::Duration;

    pub(crate) fn test_config() -> AppConfig {
        AppConfig {
            jwt_secret: "test-secret".to_string(),
            database_url: None,
            vat_rate: TaxRate::from_bps(1900),
            db_path: PathBuf::from(":memory:"),
            remote_ping_timeout: Duration::from_secs(1),
        }
    }

    /// Offline backend over an in-memory store.
    pub(crate) async fn offline_backend() -> Backend {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Backend::with_stores(test_config(), db, RemoteStore::offline())
    }

    pub(crate) fn new_seller(national_id: &str, email: &str) -> NewSeller {
        NewSeller {
            name: "Ana".to_string(),
            last_name: "Rojas".to_string(),
            national_id: national_id.to_string(),
            email: email.to_string(),
            password: "clave-123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_open_creates_the_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config().with_db_path(dir.path().join("data").join("botica.db"));
        let backend = Backend::start(config).await.unwrap();
        assert!(dir.path().join("data").join("botica.db").exists());
        assert!(backend.database().health_check().await);
        assert!(!backend.agent().remote().is_online());
        backend.shutdown().await;
    }
}
