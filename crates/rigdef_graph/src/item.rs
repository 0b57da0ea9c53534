// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene item definitions.

use crate::kind::{ItemKind, KindTag};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a scene item.
///
/// Ids are handed out by the owning [`SceneGraph`](crate::SceneGraph) in
/// construction order and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u64);

impl ItemId {
    /// Get the raw ID value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node of the rig graph.
///
/// The relation fields are private: edges are always edited through
/// [`SceneGraph`](crate::SceneGraph) so that `sources` and `depends` stay
/// mirrored.
#[derive(Debug, Clone)]
pub struct SceneItem {
    id: ItemId,
    /// Display name, not required to be unique
    pub name: String,
    pub(crate) parent: Option<ItemId>,
    pub(crate) sources: Vec<ItemId>,
    pub(crate) depends: Vec<ItemId>,
    pub(crate) metadata: IndexMap<String, serde_json::Value>,
    pub(crate) type_hierarchy: Vec<String>,
    /// Kind-specific data
    pub kind: ItemKind,
}

impl SceneItem {
    pub(crate) fn new(id: ItemId, name: String, kind: ItemKind, type_hierarchy: Vec<String>) -> Self {
        Self {
            id,
            name,
            parent: None,
            sources: Vec::new(),
            depends: Vec::new(),
            metadata: IndexMap::new(),
            type_hierarchy,
            kind,
        }
    }

    /// Get the item ID
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Get the parent, if any
    pub fn get_parent(&self) -> Option<ItemId> {
        self.parent
    }

    /// Items driving this item, parent first
    pub fn get_sources(&self) -> &[ItemId] {
        &self.sources
    }

    /// Items that list this item as a source
    pub fn get_depends(&self) -> &[ItemId] {
        &self.depends
    }

    /// The most recently added source
    pub fn get_current_source(&self) -> Option<ItemId> {
        self.sources.last().copied()
    }

    /// Type names this item was built as, most specific first
    pub fn type_hierarchy(&self) -> &[String] {
        &self.type_hierarchy
    }

    /// Most specific type name
    pub fn type_name(&self) -> &str {
        self.type_hierarchy
            .first()
            .map_or_else(|| self.kind.tag().type_name(), String::as_str)
    }

    /// Check whether the item was built as (or derives from) `type_name`.
    ///
    /// Matches the recorded ancestry as well as the base names of the kind
    /// the item was actually built as.
    pub fn is_type_of(&self, type_name: &str) -> bool {
        type_name == self.tag().type_name()
            || type_name == KindTag::SceneItem.type_name()
            || self.type_hierarchy.iter().any(|t| t == type_name)
    }

    /// Get the kind tag
    pub fn tag(&self) -> KindTag {
        self.kind.tag()
    }

    /// Set a metadata entry, replacing any previous value
    pub fn set_metadata_item(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Get a metadata entry
    pub fn get_metadata_item(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }

    /// Check for a metadata entry
    pub fn has_metadata_item(&self, key: &str) -> bool {
        self.metadata.contains_key(key)
    }

    /// Remove a metadata entry
    pub fn remove_metadata_item(&mut self, key: &str) -> Option<serde_json::Value> {
        self.metadata.shift_remove(key)
    }

    /// All metadata in insertion order
    pub fn metadata(&self) -> &IndexMap<String, serde_json::Value> {
        &self.metadata
    }
}
