//! Process-wide Store Lifecycle
//!
//! The document and preference stores are shared by everything in the
//! process. `init` creates them at most once and hands out the same
//! instances on every further call; `shutdown` releases them so a later
//! `init` starts fresh.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

use crate::config::{AppConfig, BackendConfig};
use crate::domain::StoreError;
use crate::repository::{
    DocumentStore, JsonFilePreferences, MemoryPreferences, MemoryStore, PreferenceStore, SqliteStore,
};

#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to open document store: {0}")]
    Store(StoreError),
    #[error("failed to open preference store: {0}")]
    Preferences(StoreError),
}

/// The shared store clients
#[derive(Clone)]
pub struct Backend {
    pub documents: Arc<dyn DocumentStore>,
    pub preferences: Arc<dyn PreferenceStore>,
}

fn slot() -> &'static Mutex<Option<Backend>> {
    static SLOT: OnceLock<Mutex<Option<Backend>>> = OnceLock::new();
    SLOT.get_or_init(|| Mutex::new(None))
}

/// Create the stores described by `config`, or return the existing ones
pub fn init(config: &AppConfig) -> Result<Backend, InitError> {
    let mut slot = slot().lock();
    if let Some(backend) = slot.as_ref() {
        log::debug!("[runtime] already initialized, reusing stores");
        return Ok(backend.clone());
    }

    let documents: Arc<dyn DocumentStore> = match &config.backend {
        BackendConfig::Memory => Arc::new(MemoryStore::new()),
        BackendConfig::Sqlite { path, poll_interval_ms } => Arc::new(
            SqliteStore::open(path, Duration::from_millis(*poll_interval_ms))
                .map_err(InitError::Store)?,
        ),
    };
    let preferences: Arc<dyn PreferenceStore> = match &config.preferences.path {
        Some(path) => Arc::new(JsonFilePreferences::open(path).map_err(InitError::Preferences)?),
        None => Arc::new(MemoryPreferences::new()),
    };

    let backend = Backend {
        documents,
        preferences,
    };
    *slot = Some(backend.clone());
    log::info!("[runtime] initialized ({:?})", config.backend);
    Ok(backend)
}

/// The stores created by `init`, if any
pub fn current() -> Option<Backend> {
    slot().lock().clone()
}

/// Release the shared stores. Returns false if nothing was initialized.
pub fn shutdown() -> bool {
    let released = slot().lock().take().is_some();
    if released {
        log::info!("[runtime] shut down");
    }
    released
}
