//! Domain Layer
//!
//! Contains the task list entities, the presentation mode and the error
//! taxonomy. This layer does no I/O.

mod entity;
mod item;
mod mode;

pub use entity::{Entity, ItemId, MirrorError, MirrorResult, StoreError, StoreResult};
pub use item::{DocumentFields, Item, MirrorView, RawDocument, TEXT_FIELD};
pub use mode::{ModeState, PresentationMode};
