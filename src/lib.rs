//! Live Todo
//!
//! Layered architecture:
//! - domain: Core entities, presentation mode and errors
//! - repository: Document and preference store abstractions and implementations
//! - mirror: Live mirror of a push-updated collection
//! - theme: Hydration-safe presentation mode controller
//! - render: Headless frame model consumed by front ends
//! - commands: Entry points for the render layer
//! - config / runtime: Configuration and process-wide store lifecycle

pub mod commands;
pub mod config;
pub mod domain;
pub mod mirror;
pub mod render;
pub mod repository;
pub mod runtime;
pub mod theme;

pub use commands::AppState;
pub use config::AppConfig;
pub use domain::{Item, ItemId, MirrorError, MirrorView, ModeState, PresentationMode};
pub use mirror::{LiveMirror, MirrorState, SubscriptionHandle, SyncStatus};
pub use theme::PresentationModeController;
