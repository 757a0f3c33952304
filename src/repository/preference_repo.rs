//! Preference Repository
//!
//! Key-value preference persistence: an in-memory store and a JSON file
//! store that writes through on every change.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::domain::{StoreError, StoreResult};
use super::traits::PreferenceStore;

/// In-memory preferences, scoped to the process
#[derive(Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value
    pub fn with(self, key: &str, value: &str) -> Self {
        self.values.lock().insert(key.to_string(), value.to_string());
        self
    }

    /// Make every subsequent write fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl PreferenceStore for MemoryPreferences {
    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected(format!("write of {} refused", key)));
        }
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Preferences kept as one JSON object in a file
pub struct JsonFilePreferences {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonFilePreferences {
    /// Load `path` if it exists. An unreadable file starts empty and is
    /// replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str::<Map<String, Value>>(&raw).unwrap_or_else(|e| {
                log::warn!("[prefs] ignoring malformed {}: {}", path.display(), e);
                Map::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                return Err(StoreError::Unavailable(format!("{}: {}", path.display(), e)));
            }
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &Map<String, Value>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        let encoded = serde_json::to_string_pretty(values)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, encoded).map_err(|e| StoreError::Backend(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::Backend(e.to_string()))
    }
}

impl PreferenceStore for JsonFilePreferences {
    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self
            .values
            .lock()
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut values = self.values.lock();
        values.insert(key.to_string(), Value::String(value.to_string()));
        self.persist(&values)
    }
}
