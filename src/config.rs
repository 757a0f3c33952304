//! Application Configuration
//!
//! Loaded from an optional JSON file, then overridden by environment
//! variables. The binary applies its command-line flags last.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::PresentationMode;
use crate::mirror::DEFAULT_WRITE_TIMEOUT;
use crate::repository::DEFAULT_POLL_INTERVAL;
use crate::theme::DEFAULT_PREFERENCE_KEY;

pub const ENV_COLLECTION: &str = "LIVE_TODO_COLLECTION";
pub const ENV_DB: &str = "LIVE_TODO_DB";
pub const ENV_PREFS: &str = "LIVE_TODO_PREFS";
pub const ENV_WRITE_TIMEOUT_MS: &str = "LIVE_TODO_WRITE_TIMEOUT_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which document store backs the collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// In-process store, gone when the process exits
    Memory,
    /// SQLite file shared by every process that opens it
    Sqlite {
        path: PathBuf,
        #[serde(default = "default_poll_interval_ms")]
        poll_interval_ms: u64,
    },
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesConfig {
    /// JSON file holding preferences; in-memory when absent
    pub path: Option<PathBuf>,
    pub key: String,
    pub default_mode: PresentationMode,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            path: None,
            key: DEFAULT_PREFERENCE_KEY.to_string(),
            default_mode: PresentationMode::Light,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub collection: String,
    pub preferences: PreferencesConfig,
    pub write_timeout_ms: u64,
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::Memory,
            collection: "todos".to_string(),
            preferences: PreferencesConfig::default(),
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT.as_millis() as u64,
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Read `path` (if given), then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides looked up by variable name
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(collection) = lookup(ENV_COLLECTION) {
            self.collection = collection;
        }
        if let Some(db) = lookup(ENV_DB) {
            self.use_sqlite(PathBuf::from(db));
        }
        if let Some(prefs) = lookup(ENV_PREFS) {
            self.preferences.path = Some(PathBuf::from(prefs));
        }
        if let Some(timeout) = lookup(ENV_WRITE_TIMEOUT_MS) {
            self.write_timeout_ms = timeout.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{} must be milliseconds, got {:?}", ENV_WRITE_TIMEOUT_MS, timeout))
            })?;
        }
        Ok(())
    }

    /// Switch to the SQLite backend at `path`, keeping a configured poll interval
    pub fn use_sqlite(&mut self, path: PathBuf) {
        let poll_interval_ms = match &self.backend {
            BackendConfig::Sqlite { poll_interval_ms, .. } => *poll_interval_ms,
            BackendConfig::Memory => default_poll_interval_ms(),
        };
        self.backend = BackendConfig::Sqlite { path, poll_interval_ms };
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collection.trim().is_empty() {
            return Err(ConfigError::Invalid("collection must not be empty".into()));
        }
        if self.preferences.key.trim().is_empty() {
            return Err(ConfigError::Invalid("preference key must not be empty".into()));
        }
        if self.write_timeout_ms == 0 {
            return Err(ConfigError::Invalid("write_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}
