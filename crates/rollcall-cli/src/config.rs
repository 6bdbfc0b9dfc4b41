//! `rollcall.toml` loading.
//!
//! Every section and key is optional; missing values fall back to the same
//! defaults the library types use.
//!
//! ```toml
//! [database]
//! path = "/var/lib/rollcall/rollcall.db"
//! max_connections = 10
//! busy_timeout_secs = 10
//!
//! [lock]
//! enabled = true
//! timeout_ms = 3000
//! scheme = "http"
//! path = "/unlock"
//!
//! [sweep]
//! interval_secs = 300
//! lease_ttl_secs = 600
//! lookback_days = 2
//! worker_name = "gate-a"
//! ```

use anyhow::{Context, Result};
use rollcall_engine::SweepConfig;
use rollcall_network::LockClientConfig;
use rollcall_storage::DatabaseConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: DatabaseSection,
    pub lock: LockSection,
    pub sweep: SweepSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSection {
    pub path: String,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        let defaults = DatabaseConfig::default();
        Self {
            path: defaults.database_path,
            max_connections: defaults.max_connections,
            busy_timeout_secs: defaults.busy_timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockSection {
    /// Dispatch unlocks at all
    pub enabled: bool,
    pub timeout_ms: u64,
    pub scheme: String,
    pub path: String,
}

impl Default for LockSection {
    fn default() -> Self {
        let defaults = LockClientConfig::default();
        Self {
            enabled: true,
            timeout_ms: defaults.timeout.as_millis() as u64,
            scheme: defaults.scheme,
            path: defaults.path,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepSection {
    pub interval_secs: u64,
    pub lease_ttl_secs: u64,
    /// Previous dates re-checked on every run, at most 6
    pub lookback_days: u32,
    /// Defaults to `rollcall-<pid>`
    pub worker_name: Option<String>,
}

impl Default for SweepSection {
    fn default() -> Self {
        let defaults = SweepConfig::default();
        Self {
            interval_secs: defaults.interval.as_secs(),
            lease_ttl_secs: defaults.lease_ttl.as_secs(),
            lookback_days: defaults.lookback_days,
            worker_name: None,
        }
    }
}

impl Config {
    /// Read `path`, or use defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn database(&self, path_override: Option<&str>) -> DatabaseConfig {
        let path = path_override.unwrap_or(&self.database.path);
        DatabaseConfig::new(path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_secs(self.database.busy_timeout_secs))
    }

    pub fn lock_client(&self) -> LockClientConfig {
        LockClientConfig {
            timeout: Duration::from_millis(self.lock.timeout_ms),
            scheme: self.lock.scheme.clone(),
            path: self.lock.path.clone(),
        }
    }

    pub fn sweep(&self) -> SweepConfig {
        let mut config = SweepConfig {
            interval: Duration::from_secs(self.sweep.interval_secs),
            lease_ttl: Duration::from_secs(self.sweep.lease_ttl_secs),
            lookback_days: self.sweep.lookback_days,
            ..SweepConfig::default()
        };
        if let Some(name) = &self.sweep.worker_name {
            config.worker_name = name.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.database.path, "rollcall.db");
        assert!(config.lock.enabled);
        assert_eq!(config.lock.timeout_ms, 3000);
        assert_eq!(config.sweep.interval_secs, 300);
        assert_eq!(config.sweep().lookback_days, 2);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[database]\npath = \"/tmp/att.db\"\n\n[sweep]\nworker_name = \"gate-a\"\ninterval_secs = 60\nlookback_days = 1"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.database(None).database_path, "/tmp/att.db");
        assert_eq!(config.database(Some("other.db")).database_path, "other.db");

        let sweep = config.sweep();
        assert_eq!(sweep.worker_name, "gate-a");
        assert_eq!(sweep.interval, Duration::from_secs(60));
        assert_eq!(sweep.lease_ttl, Duration::from_secs(600));
        assert_eq!(sweep.lookback_days, 1);
        assert_eq!(config.lock_client().path, "/unlock");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[lock]\nretries = 3").unwrap();

        assert!(Config::load(file.path()).is_err());
    }
}
