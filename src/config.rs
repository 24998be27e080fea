use std::path::PathBuf;

use tracing::trace;

use crate::util;

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database (default)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./sentinel.db")
}

/// Settings of the HTTP prober
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct ProberConfig {
    /// Verify TLS certificates of probed endpoints
    pub verify_tls: bool,
    pub user_agent: String,
    pub max_redirects: usize,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            verify_tls: true,
            user_agent: format!("api-sentinel/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct MonitoringSettings {
    /// Upper bound on endpoints probed at the same time within a cycle
    pub max_concurrent_checks: usize,

    /// How often `serve` triggers a periodic cycle
    pub periodic_interval_seconds: u64,
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            max_concurrent_checks: 4,
            periodic_interval_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    /// Skip new alerts when an unresolved alert of the same type is open
    /// for the same endpoint
    pub dedupe_open_alerts: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub bind_addr: String,
    pub auth_token: Option<String>,
    pub enable_cors: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind_addr: format!("{}:{}", util::DEFAULT_ADDR, util::DEFAULT_PORT),
            auth_token: None,
            enable_cors: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub prober: ProberConfig,
    pub monitoring: MonitoringSettings,
    pub alerts: AlertSettings,
    pub api: ApiSettings,
}

impl Config {
    /// Apply `SENTINEL_ADDR`, `SENTINEL_PORT` and `SENTINEL_TOKEN` on top of the file
    pub fn apply_env(mut self) -> Self {
        if let Some(bind_addr) = util::get_bind_addr() {
            self.api.bind_addr = bind_addr;
        }
        if let Some(token) = util::get_token() {
            self.api.auth_token = Some(token);
        }
        self
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
