//! Live Mirror
//!
//! Keeps an in-memory view of a remote, multi-writer collection. The mirror
//! owns exactly one push subscription at a time and drains it on a single
//! task; every snapshot replaces the view wholesale.
//!
//! Each `open` is stamped with a new epoch. Snapshot application and
//! `close` both run under the state lock, and a snapshot is only applied
//! when its epoch is still the current one and the mirror is not closed, so
//! nothing delivered after `close` (or by a retired subscription) can reach
//! the view.
//!
//! Mutations (`add`/`remove`) go straight to the store and never touch the
//! view: a new item shows up only once the push reflecting it arrives.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::{Item, ItemId, MirrorError, MirrorResult, MirrorView, RawDocument, StoreError};
use crate::repository::{CloseHandle, DocumentStore, StoreEvent, Subscription};

/// Default time a create/delete may take before it is reported as failed
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Health of the push channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// No subscription is held
    Closed,
    /// Snapshots are flowing
    Live,
    /// The channel failed; the view is the last good one and may be stale
    Degraded(String),
}

/// Everything a consumer of the mirror observes
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorState {
    pub view: MirrorView,
    pub status: SyncStatus,
    /// Epoch of the current (or last) subscription; 0 before the first open
    pub epoch: u64,
    /// Snapshots applied during the current epoch
    pub snapshots_applied: u64,
}

impl MirrorState {
    fn closed() -> Self {
        Self {
            view: MirrorView::empty(),
            status: SyncStatus::Closed,
            epoch: 0,
            snapshots_applied: 0,
        }
    }

    /// True when the view may be out of date
    pub fn is_stale(&self) -> bool {
        matches!(self.status, SyncStatus::Degraded(_))
    }

    /// The ongoing sync error, if the channel is degraded
    pub fn sync_error(&self) -> Option<MirrorError> {
        match &self.status {
            SyncStatus::Degraded(reason) => Some(MirrorError::Sync(reason.clone())),
            _ => None,
        }
    }
}

/// Identifies the subscription opened by [`LiveMirror::open`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    epoch: u64,
    collection: String,
}

impl SubscriptionHandle {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

type SharedState = Arc<watch::Sender<MirrorState>>;

/// The task draining the current subscription
struct Pump {
    task: JoinHandle<()>,
    subscription: CloseHandle,
}

impl Pump {
    /// Detach the subscription from the store and stop the task
    fn stop(self) {
        self.subscription.close();
        self.task.abort();
    }
}

/// Local mirror of one remote collection
pub struct LiveMirror {
    store: Arc<dyn DocumentStore>,
    collection: String,
    write_timeout: Duration,
    state: SharedState,
    pump: Mutex<Option<Pump>>,
}

impl LiveMirror {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        let (state, _) = watch::channel(MirrorState::closed());
        Self {
            store,
            collection: collection.into(),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            state: Arc::new(state),
            pump: Mutex::new(None),
        }
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    // ========================
    // Subscription lifecycle
    // ========================

    /// Open the push subscription.
    ///
    /// Fails with [`MirrorError::Connection`] when the store cannot be
    /// reached, and with [`MirrorError::AlreadyOpen`] when a subscription is
    /// already held. Later channel failures show up as
    /// [`SyncStatus::Degraded`], not here.
    pub async fn open(&self) -> MirrorResult<SubscriptionHandle> {
        if let Some(epoch) = self.active_epoch() {
            return Err(MirrorError::AlreadyOpen(epoch));
        }

        let subscription = self
            .store
            .subscribe(&self.collection)
            .await
            .map_err(|e| MirrorError::Connection(e.to_string()))?;

        // Claim the next epoch; a concurrent open may have won meanwhile.
        let mut claimed = None;
        self.state.send_if_modified(|state| {
            if state.status != SyncStatus::Closed {
                return false;
            }
            state.epoch += 1;
            state.view = MirrorView::empty();
            state.status = SyncStatus::Live;
            state.snapshots_applied = 0;
            claimed = Some(state.epoch);
            true
        });
        let epoch = match claimed {
            Some(epoch) => epoch,
            None => {
                let current = self.state.borrow().epoch;
                return Err(MirrorError::AlreadyOpen(current));
            }
        };

        let pump = Pump {
            subscription: subscription.close_handle(),
            task: tokio::spawn(pump_events(Arc::clone(&self.state), epoch, subscription)),
        };
        if let Some(previous) = self.pump.lock().replace(pump) {
            previous.stop();
        }

        log::info!("[mirror] opened '{}' (epoch {})", self.collection, epoch);
        Ok(SubscriptionHandle {
            epoch,
            collection: self.collection.clone(),
        })
    }

    /// Release the subscription. Safe to call any number of times; runs on
    /// drop. Once this returns the store no longer counts the subscription
    /// and no snapshot reaches the view.
    pub fn close(&self) {
        let mut closed_epoch = None;
        self.state.send_if_modified(|state| {
            if state.status == SyncStatus::Closed {
                return false;
            }
            state.status = SyncStatus::Closed;
            state.view = MirrorView::empty();
            closed_epoch = Some(state.epoch);
            true
        });
        if let Some(pump) = self.pump.lock().take() {
            pump.stop();
        }
        if let Some(epoch) = closed_epoch {
            log::info!("[mirror] closed '{}' (epoch {})", self.collection, epoch);
        }
    }

    pub fn is_open(&self) -> bool {
        self.active_epoch().is_some()
    }

    fn active_epoch(&self) -> Option<u64> {
        let state = self.state.borrow();
        (state.status != SyncStatus::Closed).then_some(state.epoch)
    }

    // ========================
    // Push delivery
    // ========================

    /// Apply a snapshot produced by the subscription of `epoch`.
    ///
    /// Returns false (and leaves the view untouched) when the epoch is stale
    /// or the mirror is closed.
    pub fn on_snapshot(&self, epoch: u64, documents: &[RawDocument]) -> bool {
        apply_snapshot(&self.state, epoch, documents)
    }

    /// Record a channel failure reported by the subscription of `epoch`
    pub fn on_channel_error(&self, epoch: u64, reason: &str) -> bool {
        apply_channel_error(&self.state, epoch, reason)
    }

    // ========================
    // Observation
    // ========================

    pub fn state(&self) -> MirrorState {
        self.state.borrow().clone()
    }

    pub fn view(&self) -> MirrorView {
        self.state.borrow().view.clone()
    }

    pub fn status(&self) -> SyncStatus {
        self.state.borrow().status.clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<MirrorState> {
        self.state.subscribe()
    }

    // ========================
    // Mutation intents
    // ========================

    /// Create an item with the trimmed `text`.
    ///
    /// Blank text fails with [`MirrorError::Validation`] without touching
    /// the store. The view is not updated here.
    pub async fn add(&self, text: &str) -> MirrorResult<ItemId> {
        let text = text.trim();
        if text.is_empty() {
            return Err(MirrorError::Validation("item text must not be empty".into()));
        }

        let id = tokio::time::timeout(
            self.write_timeout,
            self.store.create(&self.collection, Item::fields(text)),
        )
        .await
        .map_err(|_| {
            MirrorError::RemoteWrite(format!("create timed out after {:?}", self.write_timeout))
        })?
        .map_err(|e| MirrorError::RemoteWrite(e.to_string()))?;

        log::debug!("[mirror] created {} in '{}'", id, self.collection);
        Ok(id)
    }

    /// Delete an item. A store "not found" counts as success.
    pub async fn remove(&self, id: &ItemId) -> MirrorResult<()> {
        let result = tokio::time::timeout(self.write_timeout, self.store.delete(&self.collection, id))
            .await
            .map_err(|_| {
                MirrorError::RemoteWrite(format!("delete timed out after {:?}", self.write_timeout))
            })?;

        match result {
            Ok(()) => {
                log::debug!("[mirror] deleted {} from '{}'", id, self.collection);
                Ok(())
            }
            Err(StoreError::NotFound(_)) => {
                // Already gone: a duplicate delete or another writer got there first.
                log::debug!("[mirror] {} already absent from '{}'", id, self.collection);
                Ok(())
            }
            Err(e) => Err(MirrorError::RemoteWrite(e.to_string())),
        }
    }
}

impl Drop for LiveMirror {
    fn drop(&mut self) {
        self.close();
    }
}

fn apply_snapshot(state: &watch::Sender<MirrorState>, epoch: u64, documents: &[RawDocument]) -> bool {
    state.send_if_modified(|state| {
        if state.status == SyncStatus::Closed || state.epoch != epoch {
            return false;
        }
        if let SyncStatus::Degraded(reason) = &state.status {
            log::info!("[mirror] channel recovered after: {}", reason);
        }
        state.view = MirrorView::from_snapshot(documents);
        state.status = SyncStatus::Live;
        state.snapshots_applied += 1;
        true
    })
}

fn apply_channel_error(state: &watch::Sender<MirrorState>, epoch: u64, reason: &str) -> bool {
    state.send_if_modified(|state| {
        if state.status == SyncStatus::Closed || state.epoch != epoch {
            return false;
        }
        log::warn!("[mirror] channel degraded: {}", reason);
        state.status = SyncStatus::Degraded(reason.to_string());
        true
    })
}

/// Drain one subscription until it ends or its epoch is retired
async fn pump_events(state: SharedState, epoch: u64, mut subscription: Subscription) {
    while let Some(event) = subscription.next_event().await {
        let accepted = match event {
            StoreEvent::Snapshot(documents) => apply_snapshot(&state, epoch, &documents),
            StoreEvent::ChannelError(reason) => apply_channel_error(&state, epoch, &reason),
        };
        if !accepted && current_epoch_retired(&state, epoch) {
            log::debug!("[mirror] epoch {} retired, stopping", epoch);
            subscription.close();
            return;
        }
    }
    // The store hung up without a close from our side.
    apply_channel_error(&state, epoch, "subscription ended by store");
}

fn current_epoch_retired(state: &watch::Sender<MirrorState>, epoch: u64) -> bool {
    let state = state.borrow();
    state.status == SyncStatus::Closed || state.epoch != epoch
}
