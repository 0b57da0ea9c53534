// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene graph for parametric rig definitions.
//!
//! This crate provides the object model a rig definition is built from:
//! - Scene items with an ownership hierarchy and a dataflow relation
//! - A loader that rebuilds the graph from serialized records
//! - A traverser that orders items for evaluation
//!
//! ## Architecture
//!
//! Items live in a [`SceneGraph`] arena and refer to each other by
//! [`ItemId`]. A parent link is a plain id, the owning containers of
//! 3D objects and attribute groups hold child ids, and every source edge
//! is mirrored in the source's `depends` list.
//!
//! Loading is driven by a [`ConstructorRegistry`] that maps type names to
//! item kinds in a fixed priority order. References between records are
//! resolved by path through construction callbacks, so a record may point
//! at an item that is defined later in the same tree.

pub mod error;
pub mod item;
pub mod kind;
pub mod graph;
pub mod value;
pub mod record;
pub mod registry;
pub mod loader;
pub mod encode;
pub mod traversal;

pub use error::{GraphError, LoadError, ValueError};
pub use item::{ItemId, SceneItem};
pub use kind::{
    Attribute, AttributeGroup, AttributeValue, Constraint, ConstraintType, ItemKind, KindTag,
    Object3D, Operator,
};
pub use graph::SceneGraph;
pub use value::{BridgeValue, DefaultValueBridge, ValueBridge};
pub use record::Record;
pub use registry::{Constructor, ConstructorRegistry, TypeRegistration};
pub use loader::{Continuation, LoadReport, LoadSettings, Loader};
pub use encode::encode_item;
pub use traversal::{discover_by_source, discover_children, DiscoveryMode, TraversalSettings, Traverser};
