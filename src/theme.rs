//! Presentation Mode Controller
//!
//! Owns the light/dark mode. The mode starts `Unresolved`, is resolved once
//! from the preference store (falling back to a fixed default), and after
//! that only changes through `toggle`, which persists the new value.
//! Persistence is best effort: a failed write is logged and the in-memory
//! mode still changes.

use std::sync::Arc;

use tokio::sync::watch;

use crate::domain::{ModeState, PresentationMode};
use crate::repository::PreferenceStore;

/// Preference key the mode is stored under
pub const DEFAULT_PREFERENCE_KEY: &str = "theme";

pub struct PresentationModeController {
    prefs: Arc<dyn PreferenceStore>,
    key: String,
    default_mode: PresentationMode,
    state: watch::Sender<ModeState>,
}

impl PresentationModeController {
    pub fn new(prefs: Arc<dyn PreferenceStore>) -> Self {
        let (state, _) = watch::channel(ModeState::Unresolved);
        Self {
            prefs,
            key: DEFAULT_PREFERENCE_KEY.to_string(),
            default_mode: PresentationMode::default(),
            state,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Mode used when nothing usable is persisted
    pub fn with_default(mut self, mode: PresentationMode) -> Self {
        self.default_mode = mode;
        self
    }

    /// What the render layer should see right now
    pub fn state(&self) -> ModeState {
        *self.state.borrow()
    }

    pub fn mode(&self) -> Option<PresentationMode> {
        self.state().mode()
    }

    /// Receiver notified on resolution and on every toggle
    pub fn subscribe(&self) -> watch::Receiver<ModeState> {
        self.state.subscribe()
    }

    /// Resolve the mode. The first call reads the preference store; later
    /// calls return the current mode without reading again.
    pub fn resolve(&self) -> PresentationMode {
        let mut resolved = self.default_mode;
        self.state.send_if_modified(|state| match state {
            ModeState::Resolved(mode) => {
                resolved = *mode;
                false
            }
            ModeState::Unresolved => {
                resolved = self.read_persisted();
                *state = ModeState::Resolved(resolved);
                log::debug!("[theme] resolved to {}", resolved);
                true
            }
        });
        resolved
    }

    /// Flip light/dark, persist, notify. Returns the new mode.
    pub fn toggle(&self) -> PresentationMode {
        let next = self.resolve().toggled();
        if let Err(e) = self.prefs.write(&self.key, next.as_str()) {
            log::warn!("[theme] could not persist {}: {}", next, e);
        }
        self.state.send_replace(ModeState::Resolved(next));
        log::debug!("[theme] toggled to {}", next);
        next
    }

    fn read_persisted(&self) -> PresentationMode {
        match self.prefs.read(&self.key) {
            Ok(Some(value)) => PresentationMode::parse(&value).unwrap_or_else(|| {
                log::warn!("[theme] unknown persisted mode {:?}, using {}", value, self.default_mode);
                self.default_mode
            }),
            Ok(None) => self.default_mode,
            Err(e) => {
                log::warn!("[theme] could not read preference: {}", e);
                self.default_mode
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryPreferences;

    fn controller(prefs: &Arc<MemoryPreferences>) -> PresentationModeController {
        PresentationModeController::new(Arc::clone(prefs) as Arc<dyn PreferenceStore>)
    }

    #[test]
    fn test_unresolved_until_resolve() {
        let prefs = Arc::new(MemoryPreferences::new().with("theme", "dark"));
        let modes = controller(&prefs);

        assert_eq!(modes.state(), ModeState::Unresolved);
        assert_eq!(modes.mode(), None);
        assert_eq!(modes.resolve(), PresentationMode::Dark);
        assert_eq!(modes.state(), ModeState::Resolved(PresentationMode::Dark));
    }

    #[test]
    fn test_resolve_defaults_to_light() {
        let prefs = Arc::new(MemoryPreferences::new());
        assert_eq!(controller(&prefs).resolve(), PresentationMode::Light);

        let prefs = Arc::new(MemoryPreferences::new().with("theme", "system"));
        assert_eq!(controller(&prefs).resolve(), PresentationMode::Light);
    }

    #[test]
    fn test_resolve_is_stable() {
        let prefs = Arc::new(MemoryPreferences::new().with("theme", "dark"));
        let modes = controller(&prefs);

        let first = modes.resolve();
        // A change behind the controller's back does not alter the session.
        prefs.write("theme", "light").unwrap();
        assert_eq!(modes.resolve(), first);
    }

    #[test]
    fn test_toggle_persists() {
        let prefs = Arc::new(MemoryPreferences::new().with("theme", "dark"));
        let modes = controller(&prefs);

        assert_eq!(modes.resolve(), PresentationMode::Dark);
        assert_eq!(modes.toggle(), PresentationMode::Light);
        assert_eq!(modes.mode(), Some(PresentationMode::Light));
        assert_eq!(prefs.read("theme").unwrap(), Some("light".to_string()));

        assert_eq!(modes.toggle(), PresentationMode::Dark);
        assert_eq!(prefs.read("theme").unwrap(), Some("dark".to_string()));
    }

    #[test]
    fn test_toggle_before_resolve_resolves_first() {
        let prefs = Arc::new(MemoryPreferences::new());
        let modes = controller(&prefs);

        assert_eq!(modes.toggle(), PresentationMode::Dark);
    }

    #[test]
    fn test_toggle_survives_persistence_failure() {
        let prefs = Arc::new(MemoryPreferences::new());
        let modes = controller(&prefs);
        prefs.set_fail_writes(true);

        assert_eq!(modes.toggle(), PresentationMode::Dark);
        assert_eq!(modes.mode(), Some(PresentationMode::Dark));
        assert_eq!(prefs.read("theme").unwrap(), None);
    }

    #[test]
    fn test_custom_key_and_default() {
        let prefs = Arc::new(MemoryPreferences::new().with("ui.mode", "light"));
        let modes = controller(&prefs)
            .with_key("ui.mode")
            .with_default(PresentationMode::Dark);
        assert_eq!(modes.resolve(), PresentationMode::Light);

        let empty = Arc::new(MemoryPreferences::new());
        let modes = controller(&empty).with_default(PresentationMode::Dark);
        assert_eq!(modes.resolve(), PresentationMode::Dark);
    }

    #[tokio::test]
    async fn test_subscribers_are_notified() {
        let prefs = Arc::new(MemoryPreferences::new());
        let modes = controller(&prefs);
        let mut rx = modes.subscribe();

        modes.resolve();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ModeState::Resolved(PresentationMode::Light));

        // A second resolve is not a change.
        modes.resolve();
        assert!(!rx.has_changed().unwrap());

        modes.toggle();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ModeState::Resolved(PresentationMode::Dark));
    }
}
