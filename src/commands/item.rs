//! Item Commands
//!
//! Add/remove intents and the current item list.

use crate::domain::{Item, ItemId};
use super::AppState;

/// Submit new item text. The item appears once the store pushes it.
pub async fn create_item(state: &AppState, text: &str) -> Result<ItemId, String> {
    state.mirror.add(text).await.map_err(|e| e.to_string())
}

/// Delete an item; deleting one that is already gone succeeds
pub async fn delete_item(state: &AppState, id: &str) -> Result<(), String> {
    state
        .mirror
        .remove(&ItemId::from(id))
        .await
        .map_err(|e| e.to_string())
}

/// Items of the current view, in store order
pub fn list_items(state: &AppState) -> Vec<Item> {
    state.mirror.view().items().to_vec()
}
