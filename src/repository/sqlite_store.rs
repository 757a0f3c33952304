//! SQLite Document Store
//!
//! SQLite-backed implementation of [`DocumentStore`]. Documents live in one
//! table keyed by (collection, id) with their fields stored as JSON text.
//!
//! Local writes push a fresh snapshot straight away, broadcast before the
//! connection is released so snapshots reach subscribers in commit order.
//! Commits made by other
//! connections (other processes sharing the file) are picked up by a
//! watcher task polling `PRAGMA data_version`, so every viewer of the same
//! file sees every writer.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::domain::{DocumentFields, ItemId, StoreError, StoreResult};
use super::db;
use super::traits::{DocumentStore, StoreEvent, Subscribers, Subscription};

/// Default interval between `data_version` polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

type SubscriberMap = Arc<parking_lot::Mutex<HashMap<String, Subscribers>>>;

/// SQLite implementation of [`DocumentStore`]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    subscribers: SubscriberMap,
    poll_interval: Duration,
    watcher: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`. A zero `poll_interval`
    /// disables cross-connection change detection.
    pub fn open(path: impl AsRef<Path>, poll_interval: Duration) -> StoreResult<Self> {
        let conn = db::open_connection(path.as_ref())?;
        log::info!("[sqlite] opened {}", path.as_ref().display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            subscribers: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            poll_interval,
            watcher: parking_lot::Mutex::new(None),
        })
    }

    /// Private in-memory database; only this store's own writes are pushed
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open(":memory:", Duration::ZERO)
    }

    /// Load `collection` and broadcast it. Callers hold the connection.
    fn push_snapshot(&self, conn: &Connection, collection: &str) {
        let event = match db::load_collection(conn, collection) {
            Ok(docs) => StoreEvent::Snapshot(docs),
            Err(e) => StoreEvent::ChannelError(e.to_string()),
        };
        if let Some(subscribers) = self.subscribers.lock().get_mut(collection) {
            subscribers.broadcast(&event);
        }
    }

    fn ensure_watcher(&self) {
        if self.poll_interval.is_zero() {
            return;
        }
        let mut watcher = self.watcher.lock();
        if watcher.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        *watcher = Some(tokio::spawn(watch_changes(
            Arc::clone(&self.conn),
            Arc::clone(&self.subscribers),
            self.poll_interval,
        )));
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        if let Some(handle) = self.watcher.lock().take() {
            handle.abort();
        }
    }
}

/// Poll `data_version` and push snapshots of every watched collection when
/// another connection has committed. A failed poll is reported once as a
/// channel error; the next successful poll pushes fresh snapshots.
async fn watch_changes(conn: Arc<Mutex<Connection>>, subscribers: SubscriberMap, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_version: Option<i64> = None;
    let mut failed = false;

    loop {
        ticker.tick().await;

        let collections: Vec<String> = {
            let mut subscribers = subscribers.lock();
            subscribers.retain(|_, subs| subs.live() > 0);
            subscribers.keys().cloned().collect()
        };
        if collections.is_empty() {
            continue;
        }

        // Held through the broadcast so local writes cannot slip in between.
        let guard = conn.lock().await;
        let outcome = db::data_version(&guard).and_then(|version| {
            if !failed && last_version == Some(version) {
                return Ok(None);
            }
            let mut snapshots = Vec::with_capacity(collections.len());
            for collection in &collections {
                snapshots.push((collection.clone(), db::load_collection(&guard, collection)?));
            }
            Ok(Some((version, snapshots)))
        });

        match outcome {
            Ok(None) => {}
            Ok(Some((version, snapshots))) => {
                if failed {
                    log::info!("[sqlite] change watcher recovered");
                }
                failed = false;
                last_version = Some(version);
                let mut subscribers = subscribers.lock();
                for (collection, docs) in snapshots {
                    if let Some(subs) = subscribers.get_mut(&collection) {
                        subs.broadcast(&StoreEvent::Snapshot(docs));
                    }
                }
            }
            Err(e) => {
                if failed {
                    continue;
                }
                log::warn!("[sqlite] change watcher failed: {}", e);
                failed = true;
                let event = StoreEvent::ChannelError(e.to_string());
                for subs in subscribers.lock().values_mut() {
                    subs.broadcast(&event);
                }
            }
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn subscribe(&self, collection: &str) -> StoreResult<Subscription> {
        let (subscriber, subscription) = Subscription::channel();
        {
            let conn = self.conn.lock().await;
            let docs = db::load_collection(&conn, collection)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            subscriber.send(StoreEvent::Snapshot(docs));
            self.subscribers
                .lock()
                .entry(collection.to_string())
                .or_default()
                .add(subscriber);
        }
        self.ensure_watcher();
        Ok(subscription)
    }

    async fn create(&self, collection: &str, fields: DocumentFields) -> StoreResult<ItemId> {
        let id = ItemId::generate();
        let conn = self.conn.lock().await;
        db::insert_document(&conn, collection, &id, &fields)?;
        self.push_snapshot(&conn, collection);
        Ok(id)
    }

    async fn delete(&self, collection: &str, id: &ItemId) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        if db::delete_document(&conn, collection, id)? == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.push_snapshot(&conn, collection);
        Ok(())
    }
}
