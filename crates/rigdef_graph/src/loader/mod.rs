// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rebuilds a scene graph from records.
//!
//! Records reference each other by path. A reference to an item that has
//! not been built yet is parked as a continuation and fired the moment an
//! item is registered under that path, so the record tree is processed in
//! a single pass.

mod decode;

use crate::error::LoadError;
use crate::graph::SceneGraph;
use crate::item::{ItemId, SceneItem};
use crate::record::Record;
use crate::registry::{ConstructorRegistry, TypeRegistration};
use crate::value::{DefaultValueBridge, ValueBridge};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Deferred work waiting for an item path to be built
pub type Continuation = Box<dyn FnOnce(&mut SceneGraph, ItemId)>;

/// Loader configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadSettings {
    /// Type names added to the built-in constructor table
    pub extra_types: Vec<TypeRegistration>,
    /// Log a warning for every reference left unresolved
    pub warn_unresolved: bool,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            extra_types: Vec::new(),
            warn_unresolved: true,
        }
    }
}

/// Summary of a finished load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Items constructed at the top level, in order
    pub roots: Vec<ItemId>,
    /// Number of distinct paths registered
    pub built: usize,
    /// Paths registered more than once
    pub collisions: Vec<String>,
    /// Referenced paths that were never built
    pub unresolved: Vec<String>,
}

impl LoadReport {
    /// Check if every reference was resolved
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Record deserializer for one load session
pub struct Loader<'g> {
    graph: &'g mut SceneGraph,
    registry: ConstructorRegistry,
    bridge: Box<dyn ValueBridge>,
    /// Items by path; the latest registration wins
    built_items: HashMap<String, ItemId>,
    /// Items under construction, innermost last
    parent_items: Vec<ItemId>,
    /// Continuations by the path they wait for
    pending_callbacks: IndexMap<String, Vec<Continuation>>,
    collisions: Vec<String>,
    roots: Vec<ItemId>,
    warn_unresolved: bool,
}

impl<'g> Loader<'g> {
    /// Create a loader building into `graph` with the built-in types
    pub fn new(graph: &'g mut SceneGraph) -> Self {
        Self {
            graph,
            registry: ConstructorRegistry::with_defaults(),
            bridge: Box::new(DefaultValueBridge),
            built_items: HashMap::new(),
            parent_items: Vec::new(),
            pending_callbacks: IndexMap::new(),
            collisions: Vec::new(),
            roots: Vec::new(),
            warn_unresolved: true,
        }
    }

    /// Replace the constructor registry
    pub fn with_registry(mut self, registry: ConstructorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the value bridge
    pub fn with_value_bridge(mut self, bridge: Box<dyn ValueBridge>) -> Self {
        self.bridge = bridge;
        self
    }

    /// Apply settings on top of the current registry
    pub fn with_settings(mut self, settings: &LoadSettings) -> Self {
        self.registry.apply(&settings.extra_types);
        self.warn_unresolved = settings.warn_unresolved;
        self
    }

    /// The graph being built
    pub fn graph(&self) -> &SceneGraph {
        &*self.graph
    }

    /// The graph being built, mutably
    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut *self.graph
    }

    /// The value bridge used for numeric fields
    pub fn bridge(&self) -> &dyn ValueBridge {
        self.bridge.as_ref()
    }

    /// The constructor registry
    pub fn registry(&self) -> &ConstructorRegistry {
        &self.registry
    }

    /// Build an item (and everything nested in it) from a record.
    ///
    /// The new item is parented to the item currently under construction,
    /// registered under its path, and then decoded.
    pub fn construct(&mut self, record: &Record) -> Result<ItemId, LoadError> {
        let type_hierarchy = record.type_hierarchy()?;
        let name = record.name()?.to_string();
        let Some((type_name, constructor)) = self.registry.resolve(&type_hierarchy) else {
            return Err(LoadError::UnsupportedType(type_hierarchy));
        };
        tracing::debug!(name = %name, type_name, "constructing scene item");

        if let Some(&parent) = self.parent_items.last() {
            let parent_tag = self.graph.item(parent).map(SceneItem::tag);
            if let Some(parent_tag) = parent_tag.filter(|t| !t.can_own(constructor.tag())) {
                return Err(LoadError::InvalidRecord(format!(
                    "'{name}' is a {:?} item, which a {parent_tag:?} item cannot own",
                    constructor.tag()
                )));
            }
        }

        let kind = constructor.instantiate(self.bridge.as_ref(), record.get("value"))?;
        let id = self.graph.create_item(name, kind, type_hierarchy);
        match self.parent_items.last() {
            Some(&parent) => self.graph.add_child(parent, id)?,
            None => self.roots.push(id),
        }
        self.register_item(id);

        self.parent_items.push(id);
        let decoded = decode::decode_item(self, id, record);
        self.parent_items.pop();
        decoded?;

        Ok(id)
    }

    /// Construct a list of top-level records in order
    pub fn load_records(&mut self, records: &[Record]) -> Result<Vec<ItemId>, LoadError> {
        records.iter().map(|r| self.construct(r)).collect()
    }

    /// Make `item` resolvable by its path and fire anything waiting on it
    pub fn register_item(&mut self, item: ItemId) {
        let Some(path) = self.graph.path(item) else {
            tracing::warn!(%item, "cannot register an item outside the graph");
            return;
        };

        if let Some(previous) = self.built_items.insert(path.clone(), item) {
            if previous != item {
                tracing::warn!(
                    path = %path,
                    %previous,
                    %item,
                    "duplicate scene item path, later item wins the lookup"
                );
                self.collisions.push(path.clone());
            }
        }

        if let Some(waiting) = self.pending_callbacks.shift_remove(&path) {
            tracing::debug!(path = %path, count = waiting.len(), "resolving deferred references");
            for continuation in waiting {
                continuation(&mut *self.graph, item);
            }
        }
    }

    /// Run `continuation` once the item at `path` exists.
    ///
    /// Runs immediately when the path is already built.
    pub fn register_construction_callback<F>(&mut self, path: impl Into<String>, continuation: F)
    where
        F: FnOnce(&mut SceneGraph, ItemId) + 'static,
    {
        let path = path.into();
        match self.built_items.get(&path) {
            Some(&item) => continuation(&mut *self.graph, item),
            None => {
                tracing::trace!(path = %path, "deferring reference");
                self.pending_callbacks
                    .entry(path)
                    .or_default()
                    .push(Box::new(continuation));
            }
        }
    }

    /// Look up an already built item.
    ///
    /// `None` resolves to `None`; an unknown path is an error.
    pub fn resolve_scene_item(&self, path: Option<&str>) -> Result<Option<ItemId>, LoadError> {
        let Some(path) = path else {
            return Ok(None);
        };
        self.built_items
            .get(path)
            .copied()
            .map(Some)
            .ok_or_else(|| LoadError::NotFound(path.to_string()))
    }

    /// Paths with continuations still waiting
    pub fn pending_paths(&self) -> impl Iterator<Item = &str> {
        self.pending_callbacks.keys().map(String::as_str)
    }

    /// End the session.
    ///
    /// Continuations still waiting are dropped without running and their
    /// paths are reported.
    pub fn finish(self) -> LoadReport {
        let warn = self.warn_unresolved;
        let unresolved = self
            .pending_callbacks
            .into_iter()
            .map(|(path, waiting)| {
                if warn {
                    tracing::warn!(path = %path, count = waiting.len(), "reference never resolved");
                }
                path
            })
            .collect();

        LoadReport {
            roots: self.roots,
            built: self.built_items.len(),
            collisions: self.collisions,
            unresolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{AttributeValue, ConstraintType, KindTag};
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn record(value: serde_json::Value) -> Record {
        Record::from_value(value).unwrap()
    }

    fn arm_rig() -> Record {
        record(json!({
            "__typeHierarchy__": ["Container", "Object3D", "SceneItem"],
            "name": "rig",
            "children": [
                {
                    "__typeHierarchy__": ["PoseConstraint", "Constraint", "SceneItem"],
                    "name": "wristCns",
                    "constrainee": "rig.wrist",
                    "constrainers": ["rig.ctrl"],
                    "maintainOffset": true
                },
                {
                    "__typeHierarchy__": ["Joint", "Transform", "Object3D", "SceneItem"],
                    "name": "wrist",
                    "xfo": { "__valueType__": "Xfo", "tr": { "x": 1.0, "y": 2.0, "z": 0.0 } }
                },
                {
                    "__typeHierarchy__": ["Control", "Transform", "Object3D", "SceneItem"],
                    "name": "ctrl",
                    "attributeGroups": [
                        {
                            "__typeHierarchy__": ["AttributeGroup", "SceneItem"],
                            "name": "settings",
                            "attributes": [
                                {
                                    "__typeHierarchy__": ["ScalarAttribute", "NumberAttribute", "Attribute", "SceneItem"],
                                    "name": "blend",
                                    "value": 0.25,
                                    "min": 0.0,
                                    "max": 1.0
                                }
                            ]
                        }
                    ]
                }
            ]
        }))
    }

    #[test]
    fn test_construct_hierarchy() {
        let mut graph = SceneGraph::new();
        let mut loader = Loader::new(&mut graph);
        let rig = loader.construct(&arm_rig()).unwrap();

        let blend = loader.resolve_scene_item(Some("rig.ctrl.settings.blend")).unwrap().unwrap();
        let settings = loader.resolve_scene_item(Some("rig.ctrl.settings")).unwrap().unwrap();
        let ctrl = loader.resolve_scene_item(Some("rig.ctrl")).unwrap().unwrap();
        let report = loader.finish();

        assert_eq!(report.roots, vec![rig]);
        assert!(report.is_complete());
        assert_eq!(report.built, 6);

        assert_eq!(graph.get_parent(blend), Some(settings));
        assert_eq!(graph.get_parent(settings), Some(ctrl));
        assert_eq!(graph.get_sources(blend)[0], settings);
        assert_eq!(graph.children_of(ctrl), vec![settings]);

        let attribute = graph.item(blend).unwrap().kind.as_attribute().unwrap();
        assert_eq!(attribute.value, AttributeValue::Scalar(0.25));
        assert_eq!(attribute.max, Some(1.0));
    }

    #[test]
    fn test_sibling_forward_reference() {
        let mut graph = SceneGraph::new();
        let mut loader = Loader::new(&mut graph);
        loader.construct(&arm_rig()).unwrap();

        let cns = loader.resolve_scene_item(Some("rig.wristCns")).unwrap().unwrap();
        let wrist = loader.resolve_scene_item(Some("rig.wrist")).unwrap().unwrap();
        let ctrl = loader.resolve_scene_item(Some("rig.ctrl")).unwrap().unwrap();
        drop(loader);

        let constraint = graph.item(cns).unwrap().kind.as_constraint().unwrap();
        assert_eq!(constraint.constraint_type, ConstraintType::Pose);
        assert!(constraint.maintain_offset);
        assert_eq!(constraint.constrainee, Some(wrist));
        assert_eq!(constraint.constrainers, vec![ctrl]);
        assert!(graph.get_sources(wrist).contains(&cns));
        assert!(graph.get_depends(ctrl).contains(&cns));
    }

    #[test]
    fn test_callback_fires_once_after_construction() {
        let mut graph = SceneGraph::new();
        let mut loader = Loader::new(&mut graph);
        let fired = Rc::new(RefCell::new(Vec::new()));

        let seen = Rc::clone(&fired);
        loader.register_construction_callback("later", move |graph, item| {
            seen.borrow_mut().push((item, graph.item(item).map(|i| i.name.clone())));
        });
        assert!(fired.borrow().is_empty());
        assert_eq!(loader.pending_paths().collect::<Vec<_>>(), vec!["later"]);

        let later = loader.construct(&Record::new("later", &["SceneItem"])).unwrap();
        assert_eq!(*fired.borrow(), vec![(later, Some("later".to_string()))]);

        // Registering the same item again must not re-fire
        loader.register_item(later);
        assert_eq!(fired.borrow().len(), 1);
        assert!(loader.finish().is_complete());
    }

    #[test]
    fn test_callback_on_built_path_fires_immediately() {
        let mut graph = SceneGraph::new();
        let mut loader = Loader::new(&mut graph);
        let built = loader.construct(&Record::new("root", &["Transform"])).unwrap();

        let fired = Rc::new(RefCell::new(None));
        let seen = Rc::clone(&fired);
        loader.register_construction_callback("root", move |_, item| *seen.borrow_mut() = Some(item));
        assert_eq!(*fired.borrow(), Some(built));
        assert_eq!(loader.pending_paths().count(), 0);
    }

    #[test]
    fn test_forward_reference_matches_resolve() {
        let mut graph = SceneGraph::new();
        let mut loader = Loader::new(&mut graph);
        let resolved = Rc::new(RefCell::new(None));

        // R1 refers to R2 before R2 is in the stream
        let seen = Rc::clone(&resolved);
        loader.construct(&Record::new("r1", &["SceneItem"])).unwrap();
        loader.register_construction_callback("r2", move |_, item| *seen.borrow_mut() = Some(item));
        loader.construct(&Record::new("r2", &["SceneItem"])).unwrap();

        let direct = loader.resolve_scene_item(Some("r2")).unwrap();
        assert_eq!(*resolved.borrow(), direct);
    }

    #[test]
    fn test_last_registration_wins() {
        let mut graph = SceneGraph::new();
        let mut loader = Loader::new(&mut graph);
        let first = loader.construct(&Record::new("dup", &["SceneItem"])).unwrap();
        let second = loader.construct(&Record::new("dup", &["SceneItem"])).unwrap();
        let third = loader.construct(&Record::new("dup", &["SceneItem"])).unwrap();
        loader.register_item(second);

        assert_eq!(loader.resolve_scene_item(Some("dup")).unwrap(), Some(second));
        let report = loader.finish();
        assert_eq!(report.collisions, vec!["dup", "dup", "dup"]);
        assert_eq!(report.built, 1);

        // Earlier items still exist under the same path
        assert!(graph.contains(first));
        assert!(graph.contains(third));
    }

    #[test]
    fn test_resolve_scene_item() {
        let mut graph = SceneGraph::new();
        let loader = Loader::new(&mut graph);
        assert_eq!(loader.resolve_scene_item(None).unwrap(), None);
        assert!(matches!(
            loader.resolve_scene_item(Some("nowhere")),
            Err(LoadError::NotFound(path)) if path == "nowhere"
        ));
    }

    #[test]
    fn test_invalid_records() {
        let mut graph = SceneGraph::new();
        let mut loader = Loader::new(&mut graph);

        let missing_types = record(json!({ "name": "a" }));
        assert!(matches!(loader.construct(&missing_types), Err(LoadError::InvalidRecord(_))));

        let missing_name = record(json!({ "__typeHierarchy__": ["SceneItem"] }));
        assert!(matches!(loader.construct(&missing_name), Err(LoadError::InvalidRecord(_))));

        let unknown = Record::new("a", &["Spline", "Shape"]);
        assert!(matches!(
            loader.construct(&unknown),
            Err(LoadError::UnsupportedType(types)) if types == vec!["Spline", "Shape"]
        ));
    }

    #[test]
    fn test_nested_failure_aborts_load() {
        let mut graph = SceneGraph::new();
        let mut loader = Loader::new(&mut graph);
        let rig = record(json!({
            "__typeHierarchy__": ["Transform"],
            "name": "root",
            "children": [
                { "__typeHierarchy__": ["Transform"], "name": "ok" },
                { "__typeHierarchy__": ["Mystery"], "name": "bad" }
            ]
        }));
        assert!(matches!(loader.construct(&rig), Err(LoadError::UnsupportedType(_))));
    }

    #[test]
    fn test_base_attribute_types_keep_their_value() {
        let mut graph = SceneGraph::new();
        let mut loader = Loader::new(&mut graph);
        let rig = record(json!({
            "__typeHierarchy__": ["Control"],
            "name": "ctrl",
            "attributeGroups": [
                {
                    "__typeHierarchy__": ["AttributeGroup"],
                    "name": "attrs",
                    "attributes": [
                        {
                            "__typeHierarchy__": ["NumberAttribute", "Attribute", "SceneItem"],
                            "name": "weight",
                            "value": 0.75,
                            "max": 1.0
                        },
                        {
                            "__typeHierarchy__": ["Attribute", "SceneItem"],
                            "name": "count",
                            "value": 3
                        }
                    ]
                }
            ]
        }));
        loader.construct(&rig).unwrap();
        let weight = loader.resolve_scene_item(Some("ctrl.attrs.weight")).unwrap().unwrap();
        let count = loader.resolve_scene_item(Some("ctrl.attrs.count")).unwrap().unwrap();
        drop(loader);

        let weight = graph.item(weight).unwrap().kind.as_attribute().unwrap();
        assert_eq!(weight.value, AttributeValue::Scalar(0.75));
        assert_eq!(weight.max, Some(1.0));
        let count = graph.item(count).unwrap().kind.as_attribute().unwrap();
        assert_eq!(count.value, AttributeValue::Integer(3));
    }

    #[test]
    fn test_misplaced_kind_is_an_invalid_record() {
        let mut graph = SceneGraph::new();
        let mut loader = Loader::new(&mut graph);
        let rig = record(json!({
            "__typeHierarchy__": ["Control"],
            "name": "ctrl",
            "attributeGroups": [
                {
                    "__typeHierarchy__": ["AttributeGroup"],
                    "name": "attrs",
                    "attributes": [
                        { "__typeHierarchy__": ["Joint"], "name": "stray" }
                    ]
                }
            ]
        }));
        assert!(matches!(
            loader.construct(&rig),
            Err(LoadError::InvalidRecord(message)) if message.contains("stray")
        ));
        assert!(loader.resolve_scene_item(Some("ctrl.attrs.stray")).is_err());
    }

    #[test]
    fn test_unresolved_references_reported() {
        let mut graph = SceneGraph::new();
        let mut loader = Loader::new(&mut graph).with_settings(&LoadSettings {
            warn_unresolved: false,
            ..LoadSettings::default()
        });
        let rig = record(json!({
            "__typeHierarchy__": ["Transform"],
            "name": "root",
            "children": [
                {
                    "__typeHierarchy__": ["OrientationConstraint"],
                    "name": "aim",
                    "constrainee": "root.missing",
                    "constrainers": ["root"]
                }
            ]
        }));
        loader.construct(&rig).unwrap();
        let report = loader.finish();
        assert_eq!(report.unresolved, vec!["root.missing"]);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_extra_types_from_settings() {
        let settings: LoadSettings = ron::from_str(
            r#"(
                extra_types: [
                    (type_name: "FKChain", constructor: Operator, before: Some("Container")),
                ],
            )"#,
        )
        .unwrap();
        assert!(settings.warn_unresolved);

        let mut graph = SceneGraph::new();
        let mut loader = Loader::new(&mut graph).with_settings(&settings);
        let op = loader
            .construct(&Record::new("chain", &["FKChain", "Container"]))
            .unwrap();
        assert_eq!(loader.graph().item(op).unwrap().tag(), KindTag::Operator);
    }
}
