// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene graph arena holding items and their relations.

use crate::error::GraphError;
use crate::item::{ItemId, SceneItem};
use crate::kind::{Attribute, Constraint, ItemKind, KindTag, Operator};
use indexmap::IndexMap;

/// Arena of scene items.
///
/// Owns the id counter, so ids are unique per graph and several graphs can
/// coexist in one process.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    items: IndexMap<ItemId, SceneItem>,
    next_id: u64,
}

impl SceneGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached item.
    ///
    /// An empty `type_hierarchy` defaults to the kind's base type names.
    pub fn create_item(
        &mut self,
        name: impl Into<String>,
        kind: ItemKind,
        type_hierarchy: Vec<String>,
    ) -> ItemId {
        let id = ItemId(self.next_id);
        self.next_id += 1;

        let type_hierarchy = if type_hierarchy.is_empty() {
            default_hierarchy(kind.tag())
        } else {
            type_hierarchy
        };
        self.items.insert(id, SceneItem::new(id, name.into(), kind, type_hierarchy));
        id
    }

    /// Create an item owned by `parent`
    pub fn create_child(
        &mut self,
        parent: ItemId,
        name: impl Into<String>,
        kind: ItemKind,
    ) -> Result<ItemId, GraphError> {
        let parent_tag = self.get(parent)?.tag();
        if !parent_tag.can_own(kind.tag()) {
            return Err(GraphError::InvalidChild {
                parent: parent_tag,
                child: kind.tag(),
            });
        }
        let id = self.create_item(name, kind, Vec::new());
        self.add_child(parent, id)?;
        Ok(id)
    }

    /// Get an item by ID
    pub fn item(&self, id: ItemId) -> Option<&SceneItem> {
        self.items.get(&id)
    }

    /// Get a mutable item by ID
    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut SceneItem> {
        self.items.get_mut(&id)
    }

    fn get(&self, id: ItemId) -> Result<&SceneItem, GraphError> {
        self.items.get(&id).ok_or(GraphError::UnknownItem(id))
    }

    fn get_mut(&mut self, id: ItemId) -> Result<&mut SceneItem, GraphError> {
        self.items.get_mut(&id).ok_or(GraphError::UnknownItem(id))
    }

    /// Check if the item belongs to this graph
    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    /// All items in creation order
    pub fn items(&self) -> impl Iterator<Item = &SceneItem> {
        self.items.values()
    }

    /// Items without a parent, in creation order
    pub fn roots(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.items.values().filter(|i| i.parent.is_none()).map(SceneItem::id)
    }

    /// Get the number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the graph has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Dot-joined name chain from the root down to `id`
    pub fn path(&self, id: ItemId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = Some(id);
        // A parent loop would never terminate; the chain cannot be longer
        // than the graph.
        while let Some(next) = current {
            if names.len() > self.items.len() {
                break;
            }
            let item = self.items.get(&next)?;
            names.push(item.name.as_str());
            current = item.parent;
        }
        names.reverse();
        Some(names.join("."))
    }

    /// Most recently created item answering to `path`
    pub fn find_by_path(&self, path: &str) -> Option<ItemId> {
        self.items
            .keys()
            .rev()
            .copied()
            .find(|id| self.path(*id).as_deref() == Some(path))
    }

    /// Get the parent of an item
    pub fn get_parent(&self, id: ItemId) -> Option<ItemId> {
        self.items.get(&id).and_then(|i| i.parent)
    }

    /// Get the sources of an item
    pub fn get_sources(&self, id: ItemId) -> &[ItemId] {
        self.items.get(&id).map(|i| i.sources.as_slice()).unwrap_or_default()
    }

    /// Get the items depending on an item
    pub fn get_depends(&self, id: ItemId) -> &[ItemId] {
        self.items.get(&id).map(|i| i.depends.as_slice()).unwrap_or_default()
    }

    /// Get the last source of an item
    pub fn get_current_source(&self, id: ItemId) -> Option<ItemId> {
        self.items.get(&id).and_then(SceneItem::get_current_source)
    }

    /// Add `source` as a driver of `item`.
    ///
    /// Fails without changing anything if either item is unknown, if
    /// `source` is already a source, or if it would source itself.
    pub fn add_source(&mut self, item: ItemId, source: ItemId, prepend: bool) -> Result<(), GraphError> {
        if !self.items.contains_key(&source) {
            return Err(GraphError::UnknownItem(source));
        }
        if item == source {
            return Err(GraphError::SelfSource(item));
        }

        let target = self.get_mut(item)?;
        if target.sources.contains(&source) {
            return Err(GraphError::AlreadySource { item, driver: source });
        }
        if prepend {
            target.sources.insert(0, source);
        } else {
            target.sources.push(source);
        }

        let driver = self.get_mut(source)?;
        if !driver.depends.contains(&item) {
            driver.depends.push(item);
        }
        Ok(())
    }

    /// Remove every occurrence of `source` from `item`'s sources.
    ///
    /// Removing the parent also clears the parent link. Returns whether
    /// anything was removed.
    pub fn remove_source(&mut self, item: ItemId, source: ItemId) -> bool {
        let Some(target) = self.items.get_mut(&item) else {
            return false;
        };
        let before = target.sources.len();
        target.sources.retain(|s| *s != source);
        if target.sources.len() == before {
            return false;
        }
        if target.parent == Some(source) {
            target.parent = None;
        }

        if let Some(driver) = self.items.get_mut(&source) {
            driver.depends.retain(|d| *d != item);
        }
        true
    }

    /// Add a source, accepting one that is already present
    fn ensure_source(&mut self, item: ItemId, source: ItemId) -> Result<(), GraphError> {
        match self.add_source(item, source, false) {
            Err(GraphError::AlreadySource { .. }) => Ok(()),
            other => other,
        }
    }

    /// Replace the parent of `item`.
    ///
    /// The new parent becomes `sources[0]`. Owning containers are not
    /// touched; use [`add_child`](Self::add_child) for that.
    pub fn set_parent(&mut self, item: ItemId, parent: Option<ItemId>) -> Result<(), GraphError> {
        let previous = self.get(item)?.parent;
        if let Some(parent) = parent {
            self.get(parent)?;
            if parent == item {
                return Err(GraphError::SelfSource(item));
            }
        }

        if let Some(previous) = previous {
            self.remove_source(item, previous);
        }
        if let Some(parent) = parent {
            self.remove_source(item, parent);
            self.add_source(item, parent, true)?;
        }
        self.get_mut(item)?.parent = parent;
        Ok(())
    }

    /// Attach `child` to `parent`'s owning container and parent it
    pub fn add_child(&mut self, parent: ItemId, child: ItemId) -> Result<(), GraphError> {
        let parent_tag = self.get(parent)?.tag();
        let child_tag = self.get(child)?.tag();
        if !parent_tag.can_own(child_tag) {
            return Err(GraphError::InvalidChild {
                parent: parent_tag,
                child: child_tag,
            });
        }

        if let Some(previous) = self.get_parent(child).filter(|p| *p != parent) {
            if let Some(owner) = self.items.get_mut(&previous) {
                detach(&mut owner.kind, child);
            }
        }

        let owner = self.get_mut(parent)?;
        let container = match &mut owner.kind {
            ItemKind::Object3D(object) if child_tag == KindTag::AttributeGroup => &mut object.attribute_groups,
            ItemKind::Object3D(object) => &mut object.children,
            ItemKind::AttributeGroup(group) => &mut group.attributes,
            _ => {
                return Err(GraphError::InvalidChild {
                    parent: parent_tag,
                    child: child_tag,
                })
            }
        };
        if !container.contains(&child) {
            container.push(child);
        }

        self.set_parent(child, Some(parent))
    }

    /// Items in the owning containers of `id`
    pub fn children_of(&self, id: ItemId) -> Vec<ItemId> {
        self.items.get(&id).map(|i| i.kind.owned_items()).unwrap_or_default()
    }

    /// Set a metadata entry on an item
    pub fn set_metadata_item(
        &mut self,
        id: ItemId,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), GraphError> {
        self.get_mut(id)?.set_metadata_item(key, value);
        Ok(())
    }

    /// Check whether an item is of the given kind
    pub fn is_kind(&self, id: ItemId, tag: KindTag) -> bool {
        self.items.get(&id).is_some_and(|i| i.tag() == tag)
    }

    fn wrong_kind(item: &SceneItem, expected: KindTag) -> GraphError {
        GraphError::WrongKind {
            item: item.id(),
            expected,
            actual: item.tag(),
        }
    }

    fn constraint_mut(&mut self, id: ItemId) -> Result<&mut Constraint, GraphError> {
        let item = self.get_mut(id)?;
        let actual = item.tag();
        match &mut item.kind {
            ItemKind::Constraint(constraint) => Ok(constraint),
            _ => Err(GraphError::WrongKind {
                item: id,
                expected: KindTag::Constraint,
                actual,
            }),
        }
    }

    fn attribute_mut(&mut self, id: ItemId) -> Result<&mut Attribute, GraphError> {
        let item = self.get_mut(id)?;
        let actual = item.tag();
        match &mut item.kind {
            ItemKind::Attribute(attribute) => Ok(attribute),
            _ => Err(GraphError::WrongKind {
                item: id,
                expected: KindTag::Attribute,
                actual,
            }),
        }
    }

    fn operator_mut(&mut self, id: ItemId) -> Result<&mut Operator, GraphError> {
        let item = self.get_mut(id)?;
        let actual = item.tag();
        match &mut item.kind {
            ItemKind::Operator(operator) => Ok(operator),
            _ => Err(GraphError::WrongKind {
                item: id,
                expected: KindTag::Operator,
                actual,
            }),
        }
    }

    /// Bind the item a constraint drives.
    ///
    /// The constraint becomes a source of the constrainee; a previous
    /// constrainee loses that source.
    pub fn set_constrainee(&mut self, constraint: ItemId, constrainee: ItemId) -> Result<(), GraphError> {
        self.get(constrainee)?;
        let previous = self.constraint_mut(constraint)?.constrainee;
        if let Some(previous) = previous.filter(|p| *p != constrainee) {
            self.remove_source(previous, constraint);
        }
        self.ensure_source(constrainee, constraint)?;
        self.constraint_mut(constraint)?.constrainee = Some(constrainee);
        Ok(())
    }

    /// Append a driving item to a constraint
    pub fn add_constrainer(&mut self, constraint: ItemId, constrainer: ItemId) -> Result<(), GraphError> {
        self.get(constrainer)?;
        self.constraint_mut(constraint)?;
        self.ensure_source(constraint, constrainer)?;
        let data = self.constraint_mut(constraint)?;
        if !data.constrainers.contains(&constrainer) {
            data.constrainers.push(constrainer);
        }
        Ok(())
    }

    /// Connect `driver` into `attribute`, or disconnect with `None`
    pub fn connect_attribute(&mut self, attribute: ItemId, driver: Option<ItemId>) -> Result<(), GraphError> {
        if let Some(driver) = driver {
            let driver_item = self.get(driver)?;
            if driver_item.tag() != KindTag::Attribute {
                return Err(Self::wrong_kind(driver_item, KindTag::Attribute));
            }
        }
        let previous = self.attribute_mut(attribute)?.connection;
        if let Some(previous) = previous.filter(|p| Some(*p) != driver) {
            self.remove_source(attribute, previous);
        }
        if let Some(driver) = driver {
            self.ensure_source(attribute, driver)?;
        }
        self.attribute_mut(attribute)?.connection = driver;
        Ok(())
    }

    /// Bind `item` to an operator input port; the item drives the operator
    pub fn add_operator_input(&mut self, operator: ItemId, port: &str, item: ItemId) -> Result<(), GraphError> {
        self.get(item)?;
        self.operator_mut(operator)?;
        self.ensure_source(operator, item)?;
        self.operator_mut(operator)?
            .inputs
            .entry(port.to_string())
            .or_default()
            .push(item);
        Ok(())
    }

    /// Bind `item` to an operator output port; the operator drives the item
    pub fn add_operator_output(&mut self, operator: ItemId, port: &str, item: ItemId) -> Result<(), GraphError> {
        self.get(item)?;
        self.operator_mut(operator)?;
        self.ensure_source(item, operator)?;
        self.operator_mut(operator)?
            .outputs
            .entry(port.to_string())
            .or_default()
            .push(item);
        Ok(())
    }
}

/// Base type names for an item created without an explicit hierarchy
fn default_hierarchy(tag: KindTag) -> Vec<String> {
    let mut names = vec![tag.type_name().to_string()];
    if tag != KindTag::SceneItem {
        names.push(KindTag::SceneItem.type_name().to_string());
    }
    names
}

fn detach(kind: &mut ItemKind, child: ItemId) {
    match kind {
        ItemKind::Object3D(object) => {
            object.children.retain(|c| *c != child);
            object.attribute_groups.retain(|c| *c != child);
        }
        ItemKind::AttributeGroup(group) => group.attributes.retain(|c| *c != child),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{AttributeGroup, AttributeValue, ConstraintType, Object3D};
    use crate::value::{DefaultValueBridge, ValueBridge};

    fn object() -> ItemKind {
        ItemKind::Object3D(Object3D::new(DefaultValueBridge.construct("Xfo").unwrap()))
    }

    fn assert_symmetric(graph: &SceneGraph) {
        for a in graph.items() {
            for b in graph.items() {
                assert_eq!(
                    b.get_depends().contains(&a.id()),
                    a.get_sources().contains(&b.id()),
                    "asymmetric edge between {} and {}",
                    a.id(),
                    b.id()
                );
            }
        }
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut graph = SceneGraph::new();
        let a = graph.create_item("a", ItemKind::SceneItem, Vec::new());
        let b = graph.create_item("a", ItemKind::SceneItem, Vec::new());
        assert!(b > a);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.item(a).unwrap().type_hierarchy(), ["SceneItem".to_string()]);

        // A second graph counts on its own
        let mut other = SceneGraph::new();
        assert_eq!(other.create_item("x", ItemKind::SceneItem, Vec::new()), ItemId(0));
    }

    #[test]
    fn test_add_source() {
        let mut graph = SceneGraph::new();
        let a = graph.create_item("a", ItemKind::SceneItem, Vec::new());
        let b = graph.create_item("b", ItemKind::SceneItem, Vec::new());
        let c = graph.create_item("c", ItemKind::SceneItem, Vec::new());

        graph.add_source(c, a, false).unwrap();
        graph.add_source(c, b, true).unwrap();
        assert_eq!(graph.get_sources(c), &[b, a]);
        assert_eq!(graph.get_current_source(c), Some(a));
        assert_eq!(graph.get_depends(a), &[c]);

        assert_eq!(
            graph.add_source(c, a, false),
            Err(GraphError::AlreadySource { item: c, driver: a })
        );
        assert_eq!(graph.add_source(c, c, false), Err(GraphError::SelfSource(c)));
        assert_eq!(
            graph.add_source(c, ItemId(99), false),
            Err(GraphError::UnknownItem(ItemId(99)))
        );
        assert_eq!(graph.get_sources(c), &[b, a]);
        assert_symmetric(&graph);
    }

    #[test]
    fn test_remove_source() {
        let mut graph = SceneGraph::new();
        let a = graph.create_item("a", ItemKind::SceneItem, Vec::new());
        let b = graph.create_item("b", ItemKind::SceneItem, Vec::new());
        graph.add_source(b, a, false).unwrap();

        assert!(graph.remove_source(b, a));
        assert!(!graph.remove_source(b, a));
        assert!(graph.get_sources(b).is_empty());
        assert!(graph.get_depends(a).is_empty());
    }

    #[test]
    fn test_removing_parent_source_clears_parent() {
        let mut graph = SceneGraph::new();
        let parent = graph.create_item("parent", ItemKind::SceneItem, Vec::new());
        let driver = graph.create_item("driver", ItemKind::SceneItem, Vec::new());
        let item = graph.create_item("item", ItemKind::SceneItem, Vec::new());
        graph.set_parent(item, Some(parent)).unwrap();
        graph.add_source(item, driver, false).unwrap();

        assert!(graph.remove_source(item, parent));
        assert_eq!(graph.get_parent(item), None);
        assert_eq!(graph.get_sources(item), &[driver]);
        assert_eq!(graph.path(item).as_deref(), Some("item"));

        // Parent-first holds again after re-parenting
        graph.set_parent(item, Some(parent)).unwrap();
        assert_eq!(graph.get_sources(item), &[parent, driver]);
        assert_symmetric(&graph);
    }

    #[test]
    fn test_set_parent_keeps_parent_first() {
        let mut graph = SceneGraph::new();
        let p1 = graph.create_item("p1", ItemKind::SceneItem, Vec::new());
        let p2 = graph.create_item("p2", ItemKind::SceneItem, Vec::new());
        let s = graph.create_item("s", ItemKind::SceneItem, Vec::new());
        let item = graph.create_item("item", ItemKind::SceneItem, Vec::new());

        graph.add_source(item, s, false).unwrap();
        graph.set_parent(item, Some(p1)).unwrap();
        assert_eq!(graph.get_sources(item), &[p1, s]);
        assert_eq!(graph.path(item).as_deref(), Some("p1.item"));

        // New parent already present as a plain source moves to the front
        graph.add_source(item, p2, false).unwrap();
        graph.set_parent(item, Some(p2)).unwrap();
        assert_eq!(graph.get_sources(item), &[p2, s]);
        assert!(graph.get_depends(p1).is_empty());
        assert_eq!(graph.get_parent(item), Some(p2));

        graph.set_parent(item, None).unwrap();
        assert_eq!(graph.get_sources(item), &[s]);
        assert_eq!(graph.path(item).as_deref(), Some("item"));
        assert_symmetric(&graph);
    }

    #[test]
    fn test_add_child_moves_between_owners() {
        let mut graph = SceneGraph::new();
        let root = graph.create_item("root", object(), Vec::new());
        let other = graph.create_item("other", object(), Vec::new());
        let group = graph
            .create_child(root, "attrs", ItemKind::AttributeGroup(AttributeGroup::default()))
            .unwrap();
        let child = graph.create_child(root, "child", object()).unwrap();

        assert_eq!(graph.children_of(root), vec![group, child]);
        assert_eq!(graph.path(group).as_deref(), Some("root.attrs"));

        graph.add_child(other, child).unwrap();
        assert_eq!(graph.children_of(root), vec![group]);
        assert_eq!(graph.children_of(other), vec![child]);
        assert_eq!(graph.get_sources(child), &[other]);

        let attr = graph.create_item(
            "weight",
            ItemKind::Attribute(Attribute::new(AttributeValue::Scalar(1.0))),
            Vec::new(),
        );
        assert!(matches!(
            graph.add_child(root, attr),
            Err(GraphError::InvalidChild { .. })
        ));
        graph.add_child(group, attr).unwrap();
        assert_eq!(graph.path(attr).as_deref(), Some("root.attrs.weight"));
        assert_eq!(graph.find_by_path("root.attrs.weight"), Some(attr));
    }

    #[test]
    fn test_constraint_relations() {
        let mut graph = SceneGraph::new();
        let root = graph.create_item("root", object(), Vec::new());
        let target = graph.create_child(root, "target", object()).unwrap();
        let driven = graph.create_child(root, "driven", object()).unwrap();
        let other = graph.create_child(root, "other", object()).unwrap();
        let cns = graph
            .create_child(root, "cns", ItemKind::Constraint(Constraint::new(ConstraintType::Pose)))
            .unwrap();

        graph.add_constrainer(cns, target).unwrap();
        graph.add_constrainer(cns, target).unwrap();
        graph.set_constrainee(cns, driven).unwrap();
        assert_eq!(graph.get_sources(cns), &[root, target]);
        assert_eq!(graph.get_sources(driven), &[root, cns]);

        graph.set_constrainee(cns, other).unwrap();
        assert_eq!(graph.get_sources(driven), &[root]);
        assert_eq!(graph.get_sources(other), &[root, cns]);
        assert_eq!(
            graph.item(cns).unwrap().kind.as_constraint().unwrap().constrainers,
            vec![target]
        );

        assert!(matches!(
            graph.set_constrainee(target, driven),
            Err(GraphError::WrongKind { .. })
        ));
        assert_symmetric(&graph);
    }

    #[test]
    fn test_operator_and_connection_relations() {
        let mut graph = SceneGraph::new();
        let a = graph.create_item("a", ItemKind::Attribute(Attribute::new(AttributeValue::Bool(true))), Vec::new());
        let b = graph.create_item("b", ItemKind::Attribute(Attribute::new(AttributeValue::Bool(false))), Vec::new());
        let c = graph.create_item("c", ItemKind::Attribute(Attribute::new(AttributeValue::Bool(false))), Vec::new());
        let op = graph.create_item("op", ItemKind::Operator(Operator::default()), Vec::new());
        let out = graph.create_item("out", object(), Vec::new());

        graph.connect_attribute(b, Some(a)).unwrap();
        graph.connect_attribute(b, Some(c)).unwrap();
        assert_eq!(graph.get_sources(b), &[c]);
        graph.connect_attribute(b, None).unwrap();
        assert!(graph.get_sources(b).is_empty());

        graph.add_operator_input(op, "enable", a).unwrap();
        graph.add_operator_output(op, "result", out).unwrap();
        assert_eq!(graph.get_sources(op), &[a]);
        assert_eq!(graph.get_sources(out), &[op]);
        assert_eq!(graph.get_depends(op), &[out]);
        assert_symmetric(&graph);
    }

    #[test]
    fn test_path_survives_parent_loop() {
        let mut graph = SceneGraph::new();
        let a = graph.create_item("a", ItemKind::SceneItem, Vec::new());
        let b = graph.create_item("b", ItemKind::SceneItem, Vec::new());
        graph.set_parent(a, Some(b)).unwrap();
        graph.set_parent(b, Some(a)).unwrap();
        assert!(graph.path(a).is_some());
    }
}
