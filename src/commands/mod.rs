//! Commands
//!
//! Entry points the render layer calls, organized by domain. Each command
//! takes the shared [`AppState`] and reports failures as display strings.

mod item;
mod sync;
mod theme;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::mirror::LiveMirror;
use crate::render::{self, Frame};
use crate::repository::{DocumentStore, PreferenceStore};
use crate::runtime::Backend;
use crate::theme::PresentationModeController;

pub use item::*;
pub use sync::*;
pub use theme::*;

/// Application state shared across commands
pub struct AppState {
    pub mirror: LiveMirror,
    pub theme: PresentationModeController,
}

impl AppState {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        preferences: Arc<dyn PreferenceStore>,
        config: &AppConfig,
    ) -> Self {
        Self {
            mirror: LiveMirror::new(documents, config.collection.clone())
                .with_write_timeout(config.write_timeout()),
            theme: PresentationModeController::new(preferences)
                .with_key(config.preferences.key.clone())
                .with_default(config.preferences.default_mode),
        }
    }

    pub fn from_backend(backend: &Backend, config: &AppConfig) -> Self {
        Self::new(
            Arc::clone(&backend.documents),
            Arc::clone(&backend.preferences),
            config,
        )
    }
}

/// Render the current frame
pub fn render_frame(state: &AppState, draft: &str) -> Frame {
    render::compose(&state.mirror.state(), state.theme.state(), draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::domain::{Item, ModeState, PresentationMode};
    use crate::mirror::SyncStatus;
    use crate::render::Body;
    use crate::repository::{MemoryPreferences, MemoryStore};

    fn setup() -> (Arc<MemoryStore>, Arc<MemoryPreferences>, AppState) {
        let store = Arc::new(MemoryStore::new());
        let prefs = Arc::new(MemoryPreferences::new().with("theme", "dark"));
        let state = AppState::new(store.clone(), prefs.clone(), &AppConfig::default());
        (store, prefs, state)
    }

    async fn wait_for_items(state: &AppState, count: usize) {
        let mut rx = state.mirror.subscribe();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| s.view.len() == count))
            .await
            .expect("timed out waiting for items")
            .expect("mirror dropped");
    }

    #[tokio::test]
    async fn test_first_frame_hides_controls_until_resolved() {
        let (store, _prefs, state) = setup();
        store.put("todos", "a", Item::fields("x"));

        let first = render_frame(&state, "");
        assert!(first.controls.is_none());
        assert_eq!(get_theme(&state), ModeState::Unresolved);

        assert_eq!(resolve_theme(&state), PresentationMode::Dark);
        open_sync(&state).await.expect("open failed");
        wait_for_items(&state, 1).await;

        let frame = render_frame(&state, "");
        let controls = frame.controls.expect("controls after resolve");
        assert_eq!(controls.mode, PresentationMode::Dark);
        assert!(matches!(frame.body, Body::Rows(ref rows) if rows.len() == 1));
    }

    #[tokio::test]
    async fn test_item_commands_round_trip_through_push() {
        let (_store, _prefs, state) = setup();
        open_sync(&state).await.unwrap();

        let err = create_item(&state, "   ").await.unwrap_err();
        assert!(err.starts_with("validation error"));

        let id = create_item(&state, " buy milk ").await.unwrap();
        wait_for_items(&state, 1).await;
        assert_eq!(list_items(&state), vec![Item::new(id.clone(), "buy milk")]);

        delete_item(&state, id.as_str()).await.unwrap();
        wait_for_items(&state, 0).await;
        delete_item(&state, id.as_str()).await.expect("repeat delete must succeed");
    }

    #[tokio::test]
    async fn test_toggle_theme_command_persists() {
        let (_store, prefs, state) = setup();
        assert_eq!(toggle_theme(&state), PresentationMode::Light);
        assert_eq!(prefs.read("theme").unwrap(), Some("light".to_string()));
    }

    #[tokio::test]
    async fn test_sync_status_commands() {
        let (store, _prefs, state) = setup();
        assert_eq!(get_sync_status(&state), SyncStatus::Closed);

        let err = open_sync(&state).await.and(open_sync(&state).await).unwrap_err();
        assert!(err.contains("already open"));
        assert_eq!(get_sync_status(&state), SyncStatus::Live);

        close_sync(&state);
        store.set_reachable(false);
        let err = open_sync(&state).await.unwrap_err();
        assert!(err.starts_with("connection error"));
    }
}
