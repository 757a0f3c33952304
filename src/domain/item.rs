//! Item Entity
//!
//! A task list entry as held by the mirror, the raw document shape the
//! stores deliver, and the ordered view built from one snapshot.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entity::{Entity, ItemId};

/// Field holding the item text in a stored document
pub const TEXT_FIELD: &str = "text";

/// Field map of a stored document
pub type DocumentFields = serde_json::Map<String, Value>;

/// An immutable task list entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Identifier assigned by the store
    pub id: ItemId,
    /// Item text content
    pub text: String,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    /// Document fields for creating an item with `text`
    pub fn fields(text: &str) -> DocumentFields {
        let mut fields = DocumentFields::new();
        fields.insert(TEXT_FIELD.to_string(), Value::String(text.to_string()));
        fields
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A document exactly as a store delivers it in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub id: ItemId,
    #[serde(default)]
    pub fields: DocumentFields,
}

impl RawDocument {
    pub fn new(id: impl Into<ItemId>, fields: DocumentFields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn with_text(id: impl Into<ItemId>, text: &str) -> Self {
        Self::new(id, Item::fields(text))
    }

    /// Decode into an item. A missing or non-string `text` decodes to "".
    pub fn decode(&self) -> Item {
        let text = self
            .fields
            .get(TEXT_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default();
        Item::new(self.id.clone(), text)
    }
}

/// Ordered items of exactly one accepted snapshot
///
/// Cheap to clone; a new view is built for every snapshot and never
/// patched in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorView {
    items: Arc<[Item]>,
}

impl MirrorView {
    pub fn empty() -> Self {
        Self {
            items: Arc::from(Vec::new()),
        }
    }

    /// Build a view from a snapshot, keeping the store's order
    pub fn from_snapshot(documents: &[RawDocument]) -> Self {
        let items: Vec<Item> = documents.iter().map(RawDocument::decode).collect();
        Self {
            items: Arc::from(items),
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.get(id).is_some()
    }
}

impl Default for MirrorView {
    fn default() -> Self {
        Self::empty()
    }
}
