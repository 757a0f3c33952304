//! Headless Render Model
//!
//! A frame is a pure function of the mirror state, the mode state and the
//! current draft of the add form. While the mode is unresolved the frame
//! carries no interactive controls; everything else is identical to the
//! frame rendered once the mode is known, so nothing visibly switches.

use std::fmt;

use crate::domain::{ItemId, ModeState, PresentationMode};
use crate::mirror::MirrorState;

pub const TITLE: &str = "My To-Do List";
pub const EMPTY_MESSAGE: &str = "No tasks yet, add your first one!";
pub const DRAFT_PLACEHOLDER: &str = "Add a new task...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub title: &'static str,
    /// `None` until the mode is resolved
    pub controls: Option<Controls>,
    /// Set while the channel is degraded; the rows may be stale
    pub stale_notice: Option<String>,
    pub body: Body,
}

/// Interactive affordances; these depend on the resolved mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controls {
    pub mode: PresentationMode,
    pub toggle: ToggleButton,
    pub add_form: AddForm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleButton {
    /// Names the mode the button switches to
    pub label: &'static str,
    pub target: PresentationMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddForm {
    pub draft: String,
    pub placeholder: &'static str,
    pub submit_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Empty(&'static str),
    Rows(Vec<Row>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: ItemId,
    pub text: String,
}

/// Build the frame for the given inputs
pub fn compose(mirror: &MirrorState, mode: ModeState, draft: &str) -> Frame {
    let controls = mode.mode().map(|mode| {
        let target = mode.toggled();
        Controls {
            mode,
            toggle: ToggleButton {
                label: target.label(),
                target,
            },
            add_form: AddForm {
                draft: draft.to_string(),
                placeholder: DRAFT_PLACEHOLDER,
                submit_enabled: !draft.trim().is_empty(),
            },
        }
    });

    let body = if mirror.view.is_empty() {
        Body::Empty(EMPTY_MESSAGE)
    } else {
        Body::Rows(
            mirror
                .view
                .iter()
                .map(|item| Row {
                    id: item.id.clone(),
                    text: item.text.clone(),
                })
                .collect(),
        )
    };

    Frame {
        title: TITLE,
        controls,
        stale_notice: mirror.sync_error().map(|e| e.to_string()),
        body,
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.title)?;
        if let Some(controls) = &self.controls {
            writeln!(
                f,
                "[mode: {}] [toggle: {}] [add: {}]",
                controls.mode,
                controls.toggle.label,
                if controls.add_form.submit_enabled { "ready" } else { "type to add" }
            )?;
        }
        if let Some(notice) = &self.stale_notice {
            writeln!(f, "(possibly stale: {})", notice)?;
        }
        match &self.body {
            Body::Empty(message) => writeln!(f, "{}", message),
            Body::Rows(rows) => {
                for (index, row) in rows.iter().enumerate() {
                    writeln!(f, "{:>3}. {}  ({})", index + 1, row.text, row.id)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MirrorView, RawDocument};
    use crate::mirror::SyncStatus;

    fn state(docs: &[RawDocument], status: SyncStatus) -> MirrorState {
        MirrorState {
            view: MirrorView::from_snapshot(docs),
            status,
            epoch: 1,
            snapshots_applied: 1,
        }
    }

    #[test]
    fn test_unresolved_frame_differs_only_by_controls() {
        let mirror = state(&[RawDocument::with_text("a", "x")], SyncStatus::Live);

        let unresolved = compose(&mirror, ModeState::Unresolved, "");
        assert!(unresolved.controls.is_none());

        for mode in [PresentationMode::Light, PresentationMode::Dark] {
            let resolved = compose(&mirror, ModeState::Resolved(mode), "");
            assert!(resolved.controls.is_some());
            assert_eq!(Frame { controls: None, ..resolved }, unresolved);
        }
    }

    #[test]
    fn test_toggle_label_names_target_mode() {
        let mirror = state(&[], SyncStatus::Live);
        let frame = compose(&mirror, ModeState::Resolved(PresentationMode::Dark), "");
        let controls = frame.controls.unwrap();
        assert_eq!(controls.toggle.label, "Light");
        assert_eq!(controls.toggle.target, PresentationMode::Light);
    }

    #[test]
    fn test_submit_disabled_for_blank_draft() {
        let mirror = state(&[], SyncStatus::Live);
        let mode = ModeState::Resolved(PresentationMode::Light);

        let blank = compose(&mirror, mode, "   ").controls.unwrap();
        assert!(!blank.add_form.submit_enabled);
        let filled = compose(&mirror, mode, " milk ").controls.unwrap();
        assert!(filled.add_form.submit_enabled);
        assert_eq!(filled.add_form.draft, " milk ");
    }

    #[test]
    fn test_empty_and_stale_bodies() {
        let empty = compose(&state(&[], SyncStatus::Live), ModeState::Unresolved, "");
        assert_eq!(empty.body, Body::Empty(EMPTY_MESSAGE));
        assert_eq!(empty.stale_notice, None);

        let degraded = compose(
            &state(&[RawDocument::with_text("a", "x")], SyncStatus::Degraded("offline".into())),
            ModeState::Unresolved,
            "",
        );
        assert_eq!(degraded.stale_notice.as_deref(), Some("sync error: offline"));
        assert_eq!(
            degraded.body,
            Body::Rows(vec![Row { id: ItemId::from("a"), text: "x".into() }])
        );
    }

    #[test]
    fn test_display_lists_rows_in_order() {
        let mirror = state(
            &[RawDocument::with_text("a", "first"), RawDocument::with_text("b", "second")],
            SyncStatus::Live,
        );
        let text = compose(&mirror, ModeState::Resolved(PresentationMode::Light), "").to_string();
        let first = text.find("first").unwrap();
        let second = text.find("second").unwrap();
        assert!(first < second);
        assert!(text.contains("[toggle: Dark]"));
    }
}
