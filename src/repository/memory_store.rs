//! In-Process Document Store
//!
//! Multi-writer collection store living in the current process. Every
//! handle sharing one `MemoryStore` is a separate writer; each committed
//! change pushes a full snapshot to every subscriber of the collection.
//!
//! Snapshots are ordered by document id. The store also exposes switches
//! for reachability, channel failure and delayed delivery so callers can
//! exercise the failure paths of their consumers.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{DocumentFields, ItemId, RawDocument, StoreError, StoreResult};
use super::traits::{DocumentStore, StoreEvent, Subscribers, Subscription};

#[derive(Default)]
struct Collection {
    docs: BTreeMap<ItemId, DocumentFields>,
    subscribers: Subscribers,
    /// Set while the push channel is failed; no snapshots are delivered
    channel_down: bool,
    /// A change happened while delivery was paused
    pending: bool,
}

impl Collection {
    fn snapshot(&self) -> Vec<RawDocument> {
        self.docs
            .iter()
            .map(|(id, fields)| RawDocument::new(id.clone(), fields.clone()))
            .collect()
    }
}

struct Inner {
    reachable: bool,
    stall_writes: bool,
    delivery_paused: bool,
    collections: HashMap<String, Collection>,
}

/// In-process implementation of [`DocumentStore`]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                reachable: true,
                stall_writes: false,
                delivery_paused: false,
                collections: HashMap::new(),
            }),
        }
    }

    /// Write a document under a caller-chosen id (insert or replace)
    pub fn put(&self, collection: &str, id: impl Into<ItemId>, fields: DocumentFields) {
        let mut inner = self.inner.lock();
        let paused = inner.delivery_paused;
        let coll = inner.collections.entry(collection.to_string()).or_default();
        coll.docs.insert(id.into(), fields);
        Self::publish(coll, paused);
    }

    /// Current contents of a collection, in snapshot order
    pub fn documents(&self, collection: &str) -> Vec<RawDocument> {
        self.inner
            .lock()
            .collections
            .get(collection)
            .map(Collection::snapshot)
            .unwrap_or_default()
    }

    /// When unreachable, subscribe/create/delete fail with `Unavailable`
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.lock().reachable = reachable;
    }

    /// When stalled, create/delete never complete
    pub fn stall_writes(&self, stall: bool) {
        self.inner.lock().stall_writes = stall;
    }

    /// Hold back pushes; changes made meanwhile are delivered on resume
    pub fn set_delivery_paused(&self, paused: bool) {
        let mut inner = self.inner.lock();
        inner.delivery_paused = paused;
        if paused {
            return;
        }
        for coll in inner.collections.values_mut() {
            if coll.pending {
                coll.pending = false;
                Self::publish(coll, false);
            }
        }
    }

    /// Fail the push channel of `collection`
    pub fn fail_channel(&self, collection: &str, reason: &str) {
        let mut inner = self.inner.lock();
        let coll = inner.collections.entry(collection.to_string()).or_default();
        coll.channel_down = true;
        coll.subscribers
            .broadcast(&StoreEvent::ChannelError(reason.to_string()));
    }

    /// Restore a failed channel and push the current snapshot
    pub fn recover_channel(&self, collection: &str) {
        let mut inner = self.inner.lock();
        let paused = inner.delivery_paused;
        let coll = inner.collections.entry(collection.to_string()).or_default();
        coll.channel_down = false;
        Self::publish(coll, paused);
    }

    /// Number of open subscriptions on `collection`
    pub fn subscriber_count(&self, collection: &str) -> usize {
        self.inner
            .lock()
            .collections
            .get_mut(collection)
            .map(|coll| coll.subscribers.live())
            .unwrap_or(0)
    }

    fn publish(coll: &mut Collection, paused: bool) {
        if coll.channel_down {
            return;
        }
        if paused {
            coll.pending = true;
            return;
        }
        let event = StoreEvent::Snapshot(coll.snapshot());
        coll.subscribers.broadcast(&event);
    }

    /// Checks reachability; returns whether the write should stall
    fn write_gate(&self) -> StoreResult<bool> {
        let inner = self.inner.lock();
        if !inner.reachable {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(inner.stall_writes)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn subscribe(&self, collection: &str) -> StoreResult<Subscription> {
        let mut inner = self.inner.lock();
        if !inner.reachable {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        let coll = inner.collections.entry(collection.to_string()).or_default();
        let (subscriber, subscription) = Subscription::channel();
        if !coll.channel_down {
            subscriber.send(StoreEvent::Snapshot(coll.snapshot()));
        }
        coll.subscribers.add(subscriber);
        Ok(subscription)
    }

    async fn create(&self, collection: &str, fields: DocumentFields) -> StoreResult<ItemId> {
        if self.write_gate()? {
            std::future::pending::<()>().await;
        }
        let id = ItemId::generate();
        self.put(collection, id.clone(), fields);
        Ok(id)
    }

    async fn delete(&self, collection: &str, id: &ItemId) -> StoreResult<()> {
        if self.write_gate()? {
            std::future::pending::<()>().await;
        }
        let mut inner = self.inner.lock();
        let paused = inner.delivery_paused;
        // Idempotent: deleting a missing document is a no-op.
        if let Some(coll) = inner.collections.get_mut(collection) {
            if coll.docs.remove(id).is_some() {
                Self::publish(coll, paused);
            }
        }
        Ok(())
    }
}
