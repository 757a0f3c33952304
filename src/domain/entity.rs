//! Domain Layer - Core Entity Trait
//!
//! This trait defines the basic contract for all domain entities,
//! together with the identifier type and the error taxonomy shared
//! by the store and mirror layers.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Core trait for all domain entities
pub trait Entity: Sized + Send + Sync + Clone {
    /// The type of the entity's unique identifier
    type Id: Clone + Eq + std::hash::Hash + Send + Sync;

    /// Returns the entity's unique identifier
    fn id(&self) -> &Self::Id;
}

/// Opaque document identifier assigned by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh store-side identifier (UUIDv4, simple form)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ========================
// Errors
// ========================

/// Result type for document and preference store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a backing store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached at call time
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// The store refused the request
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for mirror operations
pub type MirrorResult<T> = Result<T, MirrorError>;

/// Errors surfaced by the live mirror to its callers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MirrorError {
    /// Input rejected before any store call was made
    #[error("validation error: {0}")]
    Validation(String),
    /// A create or delete was rejected or timed out
    #[error("remote write failed: {0}")]
    RemoteWrite(String),
    /// The push subscription could not be opened
    #[error("connection error: {0}")]
    Connection(String),
    /// The live channel dropped after opening; the view may be stale
    #[error("sync error: {0}")]
    Sync(String),
    /// `open` was called on a mirror that already holds a subscription
    #[error("mirror already open (epoch {0})")]
    AlreadyOpen(u64),
}
