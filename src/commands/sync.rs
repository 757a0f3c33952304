//! Sync Commands
//!
//! Open/close the live subscription and report its health.

use crate::mirror::{SubscriptionHandle, SyncStatus};
use super::AppState;

/// Open the push subscription for the configured collection
pub async fn open_sync(state: &AppState) -> Result<SubscriptionHandle, String> {
    state.mirror.open().await.map_err(|e| e.to_string())
}

/// Tear down the push subscription
pub fn close_sync(state: &AppState) {
    state.mirror.close();
}

pub fn get_sync_status(state: &AppState) -> SyncStatus {
    state.mirror.status()
}
