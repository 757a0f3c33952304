//! Repository Layer
//!
//! Store abstractions and implementations.

mod traits;
mod db;
mod memory_store;
mod sqlite_store;
mod preference_repo;

#[cfg(test)]
mod tests;

pub use traits::{
    CloseHandle, DocumentStore, PreferenceStore, StoreEvent, Subscriber, Subscribers, Subscription,
};
pub use memory_store::MemoryStore;
pub use sqlite_store::{SqliteStore, DEFAULT_POLL_INTERVAL};
pub use preference_repo::{JsonFilePreferences, MemoryPreferences};
