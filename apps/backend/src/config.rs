//! Backend configuration.
//!
//! Loaded from the environment, after an optional `.env` file.
//!
//! | Variable                   | Required | Default                     |
//! |----------------------------|----------|-----------------------------|
//! | `JWT_SECRET_KEY`           | yes      |                             |
//! | `DATABASE_URL`             | no       | offline mode                |
//! | `VAT_RATE`                 | no       | `0.0`                       |
//! | `BOTICA_DB_PATH`           | no       | `<data_dir>/botica.db`      |
//! | `REMOTE_PING_TIMEOUT_SECS` | no       | `3`                         |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use botica_core::TaxRate;
use botica_sync::DEFAULT_PING_TIMEOUT;
use directories::ProjectDirs;

const DB_FILE_NAME: &str = "botica.db";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HS256 signing key for session tokens.
    pub jwt_secret: String,

    /// Remote store connection string. `None` runs offline.
    pub database_url: Option<String>,

    pub vat_rate: TaxRate,

    /// Local store file.
    pub db_path: PathBuf,

    /// Availability probe timeout before each remote dispatch.
    pub remote_ping_timeout: Duration,
}

impl AppConfig {
    /// Loads `.env` (if present) and reads the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let present = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = present("JWT_SECRET_KEY").ok_or_else(|| ConfigError::MissingRequired("JWT_SECRET_KEY".into()))?;

        let vat_rate = match present("VAT_RATE") {
            None => TaxRate::from_bps(0),
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .and_then(TaxRate::from_fraction)
                .ok_or_else(|| ConfigError::invalid("VAT_RATE", "expected a fraction between 0 and 1"))?,
        };

        let remote_ping_timeout = match present("REMOTE_PING_TIMEOUT_SECS") {
            None => DEFAULT_PING_TIMEOUT,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::invalid("REMOTE_PING_TIMEOUT_SECS", "expected a positive number of seconds")),
            },
        };

        let db_path = present("BOTICA_DB_PATH").map(PathBuf::from).unwrap_or_else(default_db_path);

        Ok(AppConfig {
            jwt_secret,
            database_url: present("DATABASE_URL"),
            vat_rate,
            db_path,
            remote_ping_timeout,
        })
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }
}

/// Platform data directory, or the working directory when there is none.
fn default_db_path() -> PathBuf {
    ProjectDirs::from("co", "Botica", "botica")
        .map(|dirs| dirs.data_dir().join(DB_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(DB_FILE_NAME))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: &str) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_secret_is_required() {
        assert!(matches!(config(&[]), Err(ConfigError::MissingRequired(k)) if k == "JWT_SECRET_KEY"));
        assert!(matches!(config(&[("JWT_SECRET_KEY", "  ")]), Err(ConfigError::MissingRequired(_))));
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[("JWT_SECRET_KEY", "s3cret"), ("DATABASE_URL", "")]).unwrap();
        assert_eq!(cfg.vat_rate.bps(), 0);
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.remote_ping_timeout, DEFAULT_PING_TIMEOUT);
        assert!(cfg.db_path.ends_with(DB_FILE_NAME));
    }

    #[test]
    fn test_vat_rate_is_a_fraction() {
        let cfg = config(&[("JWT_SECRET_KEY", "k"), ("VAT_RATE", "0.19")]).unwrap();
        assert_eq!(cfg.vat_rate.bps(), 1900);

        assert!(matches!(
            config(&[("JWT_SECRET_KEY", "k"), ("VAT_RATE", "19")]),
            Err(ConfigError::InvalidValue { key, .. }) if key == "VAT_RATE"
        ));
        assert!(config(&[("JWT_SECRET_KEY", "k"), ("VAT_RATE", "abc")]).is_err());
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("JWT_SECRET_KEY", "k"),
            ("BOTICA_DB_PATH", "/tmp/till.db"),
            ("REMOTE_PING_TIMEOUT_SECS", "10"),
            ("DATABASE_URL", "postgres://pos@db.local/botica"),
        ])
        .unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/till.db"));
        assert_eq!(cfg.remote_ping_timeout, Duration::from_secs(10));
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://pos@db.local/botica"));
        assert!(config(&[("JWT_SECRET_KEY", "k"), ("REMOTE_PING_TIMEOUT_SECS", "0")]).is_err());
    }
}
