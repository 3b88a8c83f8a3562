//! Configuration system for LinkUp.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $LINKUP_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/linkup/config.toml
//!   3. ~/.config/linkup/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkupConfig {
    pub directory: DirectoryConfig,
    pub transport: TransportConfig,
    pub presence: PresenceConfig,
    pub discovery: DiscoveryConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// URL of the shared registry document. Empty = in-memory only.
    pub registry_url: String,
    /// URL of the shared feed document. Empty = in-memory only.
    pub feed_url: String,
    /// Registry entries older than this are pruned on publish and
    /// filtered on fetch. The same window drives the online indicator.
    pub staleness_secs: u64,
    /// Maximum number of posts kept in the feed document.
    pub feed_cap: usize,
    /// Bound on every document fetch/overwrite.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Relay endpoint, host:port.
    pub relay_addr: String,
    /// Bound on a dial attempt. A timed-out dial is retryable, not fatal.
    pub dial_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Heartbeat republish interval. Fixed — no backoff on failure.
    pub pulse_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Background discovery refresh interval.
    pub refresh_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the JSON collection files.
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// HTTP API port for UI consumers.
    pub port: u16,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for LinkupConfig {
    fn default() -> Self {
        Self {
            directory: DirectoryConfig::default(),
            transport: TransportConfig::default(),
            presence: PresenceConfig::default(),
            discovery: DiscoveryConfig::default(),
            storage: StorageConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            registry_url: String::new(),
            feed_url: String::new(),
            staleness_secs: 300,
            feed_cap: 50,
            request_timeout_secs: 10,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            relay_addr: "127.0.0.1:9300".to_string(),
            dial_timeout_secs: 10,
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            pulse_interval_secs: 15,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { refresh_secs: 30 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: data_dir(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 9301 }
    }
}

impl DirectoryConfig {
    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }
}

impl TransportConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }
}

impl PresenceConfig {
    pub fn pulse_interval(&self) -> Duration {
        Duration::from_secs(self.pulse_interval_secs)
    }
}

impl DiscoveryConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("linkup")
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("linkup")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl LinkupConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            LinkupConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("LINKUP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&LinkupConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text)
                .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply LINKUP_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LINKUP_DIRECTORY__REGISTRY_URL") {
            self.directory.registry_url = v;
        }
        if let Ok(v) = std::env::var("LINKUP_DIRECTORY__FEED_URL") {
            self.directory.feed_url = v;
        }
        if let Ok(v) = std::env::var("LINKUP_DIRECTORY__STALENESS_SECS") {
            if let Ok(n) = v.parse() {
                self.directory.staleness_secs = n;
            }
        }
        if let Ok(v) = std::env::var("LINKUP_TRANSPORT__RELAY_ADDR") {
            self.transport.relay_addr = v;
        }
        if let Ok(v) = std::env::var("LINKUP_PRESENCE__PULSE_INTERVAL_SECS") {
            if let Ok(n) = v.parse() {
                self.presence.pulse_interval_secs = n;
            }
        }
        if let Ok(v) = std::env::var("LINKUP_DISCOVERY__REFRESH_SECS") {
            if let Ok(n) = v.parse() {
                self.discovery.refresh_secs = n;
            }
        }
        if let Ok(v) = std::env::var("LINKUP_STORAGE__DATA_DIR") {
            self.storage.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LINKUP_API__PORT") {
            if let Ok(p) = v.parse() {
                self.api.port = p;
            }
        }
    }
}
