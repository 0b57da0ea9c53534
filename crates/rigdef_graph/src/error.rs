// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for graph mutation, loading and value bridging.

use crate::item::ItemId;
use crate::kind::KindTag;

/// Error when mutating the scene graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Item is not part of this graph
    #[error("Item not found: {0}")]
    UnknownItem(ItemId),

    /// Source is already present on the item
    #[error("{driver} is already a source of {item}")]
    AlreadySource {
        /// Item receiving the source
        item: ItemId,
        /// Duplicate source
        driver: ItemId,
    },

    /// An item cannot drive itself
    #[error("Item {0} cannot be its own source")]
    SelfSource(ItemId),

    /// Parent kind cannot own the child kind
    #[error("{parent:?} items cannot own {child:?} items")]
    InvalidChild {
        /// Kind of the would-be parent
        parent: KindTag,
        /// Kind of the rejected child
        child: KindTag,
    },

    /// Item has the wrong kind for the requested operation
    #[error("Item {item} is a {actual:?}, expected {expected:?}")]
    WrongKind {
        /// Offending item
        item: ItemId,
        /// Kind the operation needs
        expected: KindTag,
        /// Kind the item has
        actual: KindTag,
    },
}

/// Error while constructing a graph from records
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Record is missing required envelope keys or has ill-typed values
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// No registered constructor matches the type hierarchy
    #[error("Unsupported type: {0:?}")]
    UnsupportedType(Vec<String>),

    /// Path lookup failed
    #[error("Scene item not found: {0}")]
    NotFound(String),

    /// Graph mutation failed while decoding
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Value could not be decoded
    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Error raised by a value bridge
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// Type name not known to the bridge
    #[error("Unknown value type: {0}")]
    UnknownType(String),

    /// Field not present on the value type
    #[error("Value type {type_name} has no field '{field}'")]
    UnknownField {
        /// Value type name
        type_name: String,
        /// Requested field
        field: String,
    },

    /// Serialized value has the wrong shape
    #[error("Malformed {type_name} value: {reason}")]
    Malformed {
        /// Value type name
        type_name: String,
        /// What was wrong
        reason: String,
    },
}
