//! Repository Layer - Core Traits
//!
//! Defines the abstract interfaces of the two external stores the core
//! consumes: the push-updated document store and the preference store.
//! Implementations can be in-process, SQLite, a remote client, etc.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{DocumentFields, ItemId, RawDocument, StoreResult};

/// Event delivered on a collection subscription
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Complete, ordered listing of the collection
    Snapshot(Vec<RawDocument>),
    /// The channel failed; a later snapshot signals recovery
    ChannelError(String),
}

/// Collection-shaped document store that pushes full snapshots
///
/// All operations are async to support remote backends.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Open a push subscription. The current snapshot is delivered first,
    /// then one snapshot per change by any writer.
    async fn subscribe(&self, collection: &str) -> StoreResult<Subscription>;

    /// Create a document and return its generated id
    async fn create(&self, collection: &str, fields: DocumentFields) -> StoreResult<ItemId>;

    /// Delete a document by id
    async fn delete(&self, collection: &str, id: &ItemId) -> StoreResult<()>;
}

/// Key-value preference storage, synchronous from the caller's view
pub trait PreferenceStore: Send + Sync {
    fn read(&self, key: &str) -> StoreResult<Option<String>>;

    fn write(&self, key: &str, value: &str) -> StoreResult<()>;
}

// ========================
// Subscription channel
// ========================

/// Receiving end of a collection subscription
///
/// Dropping it, calling [`Subscription::close`] or firing a
/// [`CloseHandle`] ends delivery. A closed subscription counts as gone to
/// the store straight away, even while its receiver is still alive.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::UnboundedReceiver<StoreEvent>,
    closed: Arc<AtomicBool>,
}

impl Subscription {
    /// Create a connected sender/subscription pair
    pub fn channel() -> (Subscriber, Subscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        (
            Subscriber {
                tx,
                closed: Arc::clone(&closed),
            },
            Subscription { events: rx, closed },
        )
    }

    /// Wait for the next event; `None` once the store side is gone
    pub async fn next_event(&mut self) -> Option<StoreEvent> {
        self.events.recv().await
    }

    /// Handle that closes this subscription from outside its owner
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            closed: Arc::clone(&self.closed),
        }
    }

    /// Stop accepting events
    pub fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.events.close();
    }
}

/// Detached close switch for a [`Subscription`]
#[derive(Debug, Clone)]
pub struct CloseHandle {
    closed: Arc<AtomicBool>,
}

impl CloseHandle {
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Store-side end of a subscription
#[derive(Debug, Clone)]
pub struct Subscriber {
    tx: mpsc::UnboundedSender<StoreEvent>,
    closed: Arc<AtomicBool>,
}

impl Subscriber {
    /// Returns false when the subscription has been closed or dropped
    pub fn send(&self, event: StoreEvent) -> bool {
        !self.is_closed() && self.tx.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.tx.is_closed()
    }
}

/// Fan-out list of the live subscribers of one collection
#[derive(Debug, Default)]
pub struct Subscribers {
    senders: Vec<Subscriber>,
}

impl Subscribers {
    pub fn add(&mut self, subscriber: Subscriber) {
        self.senders.push(subscriber);
    }

    /// Send `event` to every live subscriber, dropping closed ones
    pub fn broadcast(&mut self, event: &StoreEvent) {
        self.senders.retain(|subscriber| subscriber.send(event.clone()));
    }

    /// Number of subscribers that are still open
    pub fn live(&mut self) -> usize {
        self.senders.retain(|subscriber| !subscriber.is_closed());
        self.senders.len()
    }
}
