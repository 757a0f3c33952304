//! Theme Commands

use crate::domain::{ModeState, PresentationMode};
use super::AppState;

pub fn get_theme(state: &AppState) -> ModeState {
    state.theme.state()
}

pub fn resolve_theme(state: &AppState) -> PresentationMode {
    state.theme.resolve()
}

pub fn toggle_theme(state: &AppState) -> PresentationMode {
    state.theme.toggle()
}
