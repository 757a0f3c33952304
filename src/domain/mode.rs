//! Presentation Mode
//!
//! The light/dark mode and the three-state value the render layer sees.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Light or dark presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PresentationMode {
    #[default]
    Light,
    Dark,
}

impl PresentationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresentationMode::Light => "light",
            PresentationMode::Dark => "dark",
        }
    }

    /// Parse a persisted value; anything other than light/dark is `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Some(PresentationMode::Light),
            "dark" => Some(PresentationMode::Dark),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            PresentationMode::Light => PresentationMode::Dark,
            PresentationMode::Dark => PresentationMode::Light,
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            PresentationMode::Light => "Light",
            PresentationMode::Dark => "Dark",
        }
    }
}

impl fmt::Display for PresentationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode as observed by the render layer
///
/// `Unresolved` is distinct from either mode: nothing mode-dependent may be
/// rendered while it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeState {
    #[default]
    Unresolved,
    Resolved(PresentationMode),
}

impl ModeState {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ModeState::Resolved(_))
    }

    pub fn mode(&self) -> Option<PresentationMode> {
        match self {
            ModeState::Unresolved => None,
            ModeState::Resolved(mode) => Some(*mode),
        }
    }
}

impl From<PresentationMode> for ModeState {
    fn from(mode: PresentationMode) -> Self {
        ModeState::Resolved(mode)
    }
}
