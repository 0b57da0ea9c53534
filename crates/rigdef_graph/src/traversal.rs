// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dependency ordering of scene items.
//!
//! The traverser walks from a set of root items through parent links and a
//! discovery function and emits every reached item once. Parents always
//! come before their children. Items driven by a constraint or an operator
//! are emitted only after everything the driver reads from.

use crate::graph::SceneGraph;
use crate::item::{ItemId, SceneItem};
use crate::kind::KindTag;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Built-in discovery functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiscoveryMode {
    /// Follow sources, plus the outputs of source operators
    #[default]
    Sources,
    /// Follow owning containers (attribute groups, children, attributes)
    Children,
}

impl DiscoveryMode {
    /// Run the discovery function for `item`
    pub fn discover(&self, graph: &SceneGraph, item: ItemId) -> Vec<ItemId> {
        match self {
            Self::Sources => discover_by_source(graph, item),
            Self::Children => discover_children(graph, item),
        }
    }
}

/// Traversal configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalSettings {
    /// Discovery function to use
    pub discovery: DiscoveryMode,
    /// Emit undriven items before their discoveries
    pub discovered_items_first: bool,
}

impl Default for TraversalSettings {
    fn default() -> Self {
        Self {
            discovery: DiscoveryMode::Sources,
            discovered_items_first: true,
        }
    }
}

/// Sources of `item`; an operator source is followed by its output items
pub fn discover_by_source(graph: &SceneGraph, item: ItemId) -> Vec<ItemId> {
    let mut discovered = Vec::new();
    for &source in graph.get_sources(item) {
        discovered.push(source);
        if let Some(operator) = graph.item(source).and_then(|s| s.kind.as_operator()) {
            discovered.extend(operator.output_items());
        }
    }
    discovered
}

/// Items owned by `item`
pub fn discover_children(graph: &SceneGraph, item: ItemId) -> Vec<ItemId> {
    graph.children_of(item)
}

/// State shared by one traversal pass
struct Pass<'a, D, F> {
    graph: &'a SceneGraph,
    discover: D,
    discovered_items_first: bool,
    on_item: F,
}

/// Linearizes a scene graph into evaluation order
#[derive(Debug, Clone, Default)]
pub struct Traverser {
    root_items: Vec<ItemId>,
    visited: HashSet<ItemId>,
    items: Vec<ItemId>,
}

impl Traverser {
    /// Create a traverser without roots
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root; returns false if it was already a root
    pub fn add_root_item(&mut self, item: ItemId) -> bool {
        if self.root_items.contains(&item) {
            return false;
        }
        self.root_items.push(item);
        true
    }

    /// Add several roots in order
    pub fn add_root_items(&mut self, items: impl IntoIterator<Item = ItemId>) {
        for item in items {
            self.add_root_item(item);
        }
    }

    /// Roots in addition order
    pub fn root_items(&self) -> &[ItemId] {
        &self.root_items
    }

    /// Output of the last traversal
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    /// Forget the output of the last traversal
    pub fn reset(&mut self) {
        self.visited.clear();
        self.items.clear();
    }

    /// Order every item reachable from the roots.
    ///
    /// `discover` yields the further items to visit after an item's
    /// parent; `item_callback` runs once per emitted item, in order.
    pub fn traverse<D, F>(
        &mut self,
        graph: &SceneGraph,
        discover: D,
        discovered_items_first: bool,
        item_callback: F,
    ) -> &[ItemId]
    where
        D: Fn(&SceneGraph, ItemId) -> Vec<ItemId>,
        F: FnMut(&SceneItem),
    {
        self.reset();
        let mut pass = Pass {
            graph,
            discover,
            discovered_items_first,
            on_item: item_callback,
        };
        let roots = self.root_items.clone();
        for root in roots {
            self.visit(&mut pass, root);
        }
        tracing::debug!(
            roots = self.root_items.len(),
            items = self.items.len(),
            "traversal complete"
        );
        &self.items
    }

    /// Traverse with a configured discovery mode
    pub fn traverse_with<F>(&mut self, graph: &SceneGraph, settings: &TraversalSettings, item_callback: F) -> &[ItemId]
    where
        F: FnMut(&SceneItem),
    {
        let mode = settings.discovery;
        self.traverse(
            graph,
            move |graph: &SceneGraph, item| mode.discover(graph, item),
            settings.discovered_items_first,
            item_callback,
        )
    }

    /// Items of the last traversal built as any of `type_names`
    pub fn get_items_of_type(&self, graph: &SceneGraph, type_names: &[&str]) -> Vec<ItemId> {
        self.items
            .iter()
            .copied()
            .filter(|id| {
                graph
                    .item(*id)
                    .is_some_and(|item| type_names.iter().any(|t| item.is_type_of(t)))
            })
            .collect()
    }

    fn visit<D, F>(&mut self, pass: &mut Pass<'_, D, F>, id: ItemId)
    where
        D: Fn(&SceneGraph, ItemId) -> Vec<ItemId>,
        F: FnMut(&SceneItem),
    {
        if self.visited.contains(&id) {
            return;
        }
        let graph = pass.graph;
        let Some(item) = graph.item(id) else {
            return;
        };
        self.visited.insert(id);

        if let Some(parent) = item.get_parent() {
            if item.tag() == KindTag::Attribute && !self.visited.contains(&parent) {
                // Schedule the whole group first; its discoveries may emit
                // this attribute along with its siblings.
                self.visited.remove(&id);
                self.visit(pass, parent);
                if self.visited.contains(&parent) && !self.visited.contains(&id) {
                    self.visit(pass, id);
                }
                return;
            }
            self.visit(pass, parent);
        }

        let sourced_by_driver = item
            .get_sources()
            .iter()
            .any(|s| graph.item(*s).is_some_and(|s| s.tag().is_driver()));

        if pass.discovered_items_first && !sourced_by_driver {
            self.collect(pass, item);
        }

        for discovered in (pass.discover)(graph, id) {
            self.visit(pass, discovered);
        }

        if !pass.discovered_items_first || sourced_by_driver {
            self.collect(pass, item);
        }
    }

    fn collect<D, F>(&mut self, pass: &mut Pass<'_, D, F>, item: &SceneItem)
    where
        F: FnMut(&SceneItem),
    {
        tracing::trace!(item = %item.id(), name = %item.name, "collected");
        self.items.push(item.id());
        (pass.on_item)(item);
    }
}
