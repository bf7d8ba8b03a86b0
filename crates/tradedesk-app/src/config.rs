//! Application configuration.
//!
//! Layering, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. TOML file (optional)
//! 3. `TRADEDESK_<SECTION>__<KEY>` environment variables

use crate::error::{AppError, AppResult};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tradedesk_relay::RelayConfig;
use tradedesk_store::StoreConfig;

/// Config file used when neither `--config` nor `TRADEDESK_CONFIG` is set.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const ENV_PREFIX: &str = "TRADEDESK";

/// Market data gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for MarketSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl MarketSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Live feed relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySection {
    /// Fixed feed URL; skips endpoint discovery when set.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
    /// Connect plus WebSocket upgrade, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_outbound_capacity() -> usize {
    64
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            url: None,
            outbound_capacity: default_outbound_capacity(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl From<RelaySection> for RelayConfig {
    fn from(section: RelaySection) -> Self {
        Self {
            url: section.url,
            outbound_capacity: section.outbound_capacity,
            connect_timeout: Duration::from_secs(section.connect_timeout_secs),
        }
    }
}

/// Row store backend for signed-in users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowBackend {
    /// Process-local rows; nothing survives a restart.
    #[default]
    Memory,
    /// PostgREST-style table.
    Rest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceSection {
    #[serde(default)]
    pub backend: RowBackend,
    /// REST root, e.g. `https://project.example.co/rest/v1`.
    #[serde(default)]
    pub rest_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
    /// Guest snapshots.
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
}

fn default_table() -> String {
    "watchlist".to_string()
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from(".tradedesk/snapshots")
}

impl Default for PersistenceSection {
    fn default() -> Self {
        Self {
            backend: RowBackend::default(),
            rest_url: None,
            api_key: None,
            table: default_table(),
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

/// Identity source.
///
/// `auth_url` takes precedence over `user_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSection {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    /// Directory holding the guest marker.
    #[serde(default = "default_session_dir")]
    pub dir: PathBuf,
}

fn default_session_dir() -> PathBuf {
    PathBuf::from(".tradedesk/session")
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            dir: default_session_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySection {
    /// Seconds between metrics summaries in the watch loop. 0 disables.
    #[serde(default = "default_metrics_log_interval_secs")]
    pub metrics_log_interval_secs: u64,
}

fn default_metrics_log_interval_secs() -> u64 {
    60
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            metrics_log_interval_secs: default_metrics_log_interval_secs(),
        }
    }
}

impl TelemetrySection {
    pub fn metrics_log_interval(&self) -> Option<Duration> {
        (self.metrics_log_interval_secs > 0)
            .then(|| Duration::from_secs(self.metrics_log_interval_secs))
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub market: MarketSection,
    #[serde(default)]
    pub relay: RelaySection,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub persistence: PersistenceSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl AppConfig {
    /// Resolve the config path: CLI arg > `TRADEDESK_CONFIG` > default.
    pub fn resolve_path(cli: Option<String>) -> String {
        cli.or_else(|| std::env::var("TRADEDESK_CONFIG").ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load `path` (missing file is fine) under process environment overrides.
    pub fn load(path: &str) -> AppResult<Self> {
        Self::build(path, None)
    }

    /// Load with an explicit environment instead of the process one.
    pub fn load_with_env(path: &str, env: HashMap<String, String>) -> AppResult<Self> {
        Self::build(path, Some(env))
    }

    fn build(path: &str, env: Option<HashMap<String, String>>) -> AppResult<Self> {
        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .source(env);

        let config = Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(environment)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let app: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        app.validate()?;
        Ok(app)
    }

    /// Reject combinations that cannot start.
    pub fn validate(&self) -> AppResult<()> {
        if self.store.history_window == 0 {
            return Err(AppError::Config(
                "store.history_window must be at least 1".to_string(),
            ));
        }
        if self.relay.connect_timeout_secs == 0 {
            return Err(AppError::Config(
                "relay.connect_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.persistence.backend == RowBackend::Rest {
            if self.persistence.rest_url.is_none() {
                return Err(AppError::Config(
                    "persistence.rest_url is required for the rest backend".to_string(),
                ));
            }
            if self.persistence.api_key.is_none() {
                return Err(AppError::Config(
                    "persistence.api_key is required for the rest backend".to_string(),
                ));
            }
        }
        if self.auth.auth_url.is_some() && self.persistence.api_key.is_none() {
            return Err(AppError::Config(
                "auth.auth_url needs persistence.api_key".to_string(),
            ));
        }
        Ok(())
    }
}
