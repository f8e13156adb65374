//! Configuration management

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::members::ADMIN_ROLE;
use crate::notify::DispatchMode;
use crate::storage::StorageConfig;
use crate::tasker::AckPolicy;

// ============================================================================
// Worker Configuration Constants
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/importer";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default apalis worker name.
pub const DEFAULT_WORKER_NAME: &str = "importer-worker";

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub worker: WorkerConfig,
    pub storage: StorageConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Importer behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub name: String,
    pub ack_policy: AckPolicy,
    pub dispatch_mode: DispatchMode,
    /// Hash single-part uploads and compare against the storage tag
    pub verify_content_digest: bool,
    /// Role whose members receive every import notification of their tenant
    pub admin_role: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_WORKER_NAME.to_string(),
            ack_policy: AckPolicy::default(),
            dispatch_mode: DispatchMode::default(),
            verify_content_digest: false,
            admin_role: ADMIN_ROLE.to_string(),
        }
    }
}

/// Worker name suffixed with the host name, so replicas register separately
fn default_worker_name() -> String {
    match hostname::get() {
        Ok(host) => format!("{}-{}", DEFAULT_WORKER_NAME, host.to_string_lossy()),
        Err(_) => DEFAULT_WORKER_NAME.to_string(),
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: std::env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: std::env::var("DATABASE_CONNECT_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
                idle_timeout_secs: std::env::var("DATABASE_IDLE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_IDLE_TIMEOUT_SECS),
            },
            worker: WorkerConfig {
                name: std::env::var("IMPORTER_WORKER_NAME")
                    .unwrap_or_else(|_| default_worker_name()),
                ack_policy: parse_env("IMPORTER_ACK_POLICY")?.unwrap_or_default(),
                dispatch_mode: parse_env("IMPORTER_DISPATCH_MODE")?.unwrap_or_default(),
                verify_content_digest: std::env::var("IMPORTER_VERIFY_CONTENT_DIGEST")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(false),
                admin_role: std::env::var("IMPORTER_ADMIN_ROLE")
                    .unwrap_or_else(|_| ADMIN_ROLE.to_string()),
            },
            storage: StorageConfig::from_env()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.worker.name.trim().is_empty() {
            anyhow::bail!("Worker name cannot be empty");
        }

        if self.worker.admin_role.trim().is_empty() {
            anyhow::bail!("Admin role cannot be empty");
        }

        if self.worker.ack_policy == AckPolicy::AlwaysAck {
            tracing::debug!("Job-level errors will be acknowledged without redelivery");
        }

        self.storage.validate()
    }
}

/// Parse an optional enum-valued variable; an unparsable value is an error
fn parse_env<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr<Err = String>,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{}: {}", key, e)),
        Err(_) => Ok(None),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            worker: WorkerConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const WORKER_VARS: &[&str] = &[
        "IMPORTER_WORKER_NAME",
        "IMPORTER_ACK_POLICY",
        "IMPORTER_DISPATCH_MODE",
        "IMPORTER_VERIFY_CONTENT_DIGEST",
        "IMPORTER_ADMIN_ROLE",
    ];

    fn clear_worker_vars() {
        for key in WORKER_VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.worker.ack_policy, AckPolicy::AlwaysAck);
        assert_eq!(config.worker.dispatch_mode, DispatchMode::FireAndForget);
        assert_eq!(config.worker.admin_role, "app-owner");
    }

    #[test]
    fn test_validate_pool_bounds() {
        let mut config = Config::default();
        config.database.min_connections = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_load_worker_settings_from_env() {
        clear_worker_vars();
        std::env::set_var("IMPORTER_ACK_POLICY", "ack_only_on_full_success");
        std::env::set_var("IMPORTER_DISPATCH_MODE", "await_ack");
        std::env::set_var("IMPORTER_VERIFY_CONTENT_DIGEST", "true");

        let config = Config::load();
        clear_worker_vars();
        let config = config.unwrap();

        assert_eq!(config.worker.ack_policy, AckPolicy::AckOnlyOnFullSuccess);
        assert_eq!(config.worker.dispatch_mode, DispatchMode::AwaitAck);
        assert!(config.worker.verify_content_digest);
        assert!(config.worker.name.starts_with(DEFAULT_WORKER_NAME));
    }

    #[test]
    #[serial]
    fn test_load_rejects_unknown_ack_policy() {
        clear_worker_vars();
        std::env::set_var("IMPORTER_ACK_POLICY", "sometimes");

        let result = Config::load();
        clear_worker_vars();

        assert!(result.is_err());
    }
}
