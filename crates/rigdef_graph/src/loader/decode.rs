// SPDX-License-Identifier: MIT OR Apache-2.0
//! Kind-specific record decoding.

use super::Loader;
use crate::error::{GraphError, LoadError};
use crate::graph::SceneGraph;
use crate::item::ItemId;
use crate::kind::{AttributeValue, ItemKind, KindTag};
use crate::record::{paths_of, Record, METADATA_KEY};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Decode everything past the envelope into the freshly built `item`
pub(super) fn decode_item(loader: &mut Loader<'_>, item: ItemId, record: &Record) -> Result<(), LoadError> {
    if let Some(metadata) = record.object_field(METADATA_KEY)? {
        for (key, value) in metadata {
            loader.graph_mut().set_metadata_item(item, key.clone(), value.clone())?;
        }
    }

    let tag = kind_of(loader, item)?.tag();
    match tag {
        KindTag::Object3D => decode_object3d(loader, item, record),
        KindTag::AttributeGroup => {
            for attribute in record.records("attributes")? {
                loader.construct(&attribute)?;
            }
            Ok(())
        }
        KindTag::Attribute => decode_attribute(loader, item, record),
        KindTag::Constraint => decode_constraint(loader, item, record),
        KindTag::Operator => decode_operator(loader, item, record),
        KindTag::SceneItem => Ok(()),
    }
}

fn kind_of<'l>(loader: &'l Loader<'_>, item: ItemId) -> Result<&'l ItemKind, LoadError> {
    loader
        .graph()
        .item(item)
        .map(|i| &i.kind)
        .ok_or(LoadError::Graph(GraphError::UnknownItem(item)))
}

fn kind_mut<'l>(loader: &'l mut Loader<'_>, item: ItemId) -> Result<&'l mut ItemKind, LoadError> {
    loader
        .graph_mut()
        .item_mut(item)
        .map(|i| &mut i.kind)
        .ok_or(LoadError::Graph(GraphError::UnknownItem(item)))
}

fn decode_object3d(loader: &mut Loader<'_>, item: ItemId, record: &Record) -> Result<(), LoadError> {
    let xfo = match record.get("xfo") {
        Some(data) => Some(loader.bridge().decode(data, "Xfo")?),
        None => None,
    };
    let visible = record.bool_field("visible")?;
    let color = record.str_field("color")?.map(str::to_string);

    if let ItemKind::Object3D(object) = kind_mut(loader, item)? {
        if let Some(xfo) = xfo {
            object.xfo = xfo;
        }
        if let Some(visible) = visible {
            object.visible = visible;
        }
        object.color = color;
    }

    for group in record.records("attributeGroups")? {
        loader.construct(&group)?;
    }
    for child in record.records("children")? {
        loader.construct(&child)?;
    }
    Ok(())
}

fn decode_attribute(loader: &mut Loader<'_>, item: ItemId, record: &Record) -> Result<(), LoadError> {
    let current = match kind_of(loader, item)? {
        ItemKind::Attribute(attribute) => attribute.value.clone(),
        _ => return Ok(()),
    };
    let value = match record.get("value") {
        Some(data) => decode_attribute_value(loader, &current, data)?,
        None => current,
    };
    let (min, max) = if value.is_numeric() {
        (record.f64_field("min")?, record.f64_field("max")?)
    } else {
        (None, None)
    };

    if let ItemKind::Attribute(attribute) = kind_mut(loader, item)? {
        attribute.value = value;
        attribute.min = min;
        attribute.max = max;
    }

    if let Some(path) = record.str_field("connection")? {
        loader.register_construction_callback(path, move |graph, driver| {
            report(graph.connect_attribute(item, Some(driver)), "connect attribute");
        });
    }
    Ok(())
}

/// Read `data` as the same variant as `current`
fn decode_attribute_value(
    loader: &Loader<'_>,
    current: &AttributeValue,
    data: &Value,
) -> Result<AttributeValue, LoadError> {
    let mistyped = |expected: &str| {
        LoadError::InvalidRecord(format!(
            "{} value must be {expected}",
            current.attribute_type_name()
        ))
    };
    Ok(match current {
        AttributeValue::Bool(_) => AttributeValue::Bool(data.as_bool().ok_or_else(|| mistyped("a boolean"))?),
        AttributeValue::Scalar(_) => AttributeValue::Scalar(data.as_f64().ok_or_else(|| mistyped("a number"))?),
        AttributeValue::Integer(_) => AttributeValue::Integer(data.as_i64().ok_or_else(|| mistyped("an integer"))?),
        AttributeValue::String(_) => {
            AttributeValue::String(data.as_str().ok_or_else(|| mistyped("a string"))?.to_string())
        }
        AttributeValue::Color(_) => AttributeValue::Color(loader.bridge().decode(data, "Color")?),
    })
}

fn decode_constraint(loader: &mut Loader<'_>, item: ItemId, record: &Record) -> Result<(), LoadError> {
    if let Some(maintain_offset) = record.bool_field("maintainOffset")? {
        if let ItemKind::Constraint(constraint) = kind_mut(loader, item)? {
            constraint.maintain_offset = maintain_offset;
        }
    }

    let constrainers = record.paths("constrainers")?;
    bind_in_order(loader, constrainers, move |graph, constrainer| {
        report(graph.add_constrainer(item, constrainer), "add constrainer");
    });

    if let Some(path) = record.str_field("constrainee")? {
        loader.register_construction_callback(path, move |graph, constrainee| {
            report(graph.set_constrainee(item, constrainee), "set constrainee");
        });
    }
    Ok(())
}

fn decode_operator(loader: &mut Loader<'_>, item: ItemId, record: &Record) -> Result<(), LoadError> {
    let solver_type = record.str_field("solverTypeName")?.map(str::to_string);
    let inputs = port_paths(record, "inputs")?;
    let outputs = port_paths(record, "outputs")?;

    // Declare every port up front so empty ports survive
    if let ItemKind::Operator(operator) = kind_mut(loader, item)? {
        operator.solver_type = solver_type;
        for (port, _) in &inputs {
            operator.inputs.entry(port.clone()).or_default();
        }
        for (port, _) in &outputs {
            operator.outputs.entry(port.clone()).or_default();
        }
    }

    for (port, paths) in inputs {
        bind_in_order(loader, paths, move |graph, input| {
            report(graph.add_operator_input(item, &port, input), "bind operator input");
        });
    }
    for (port, paths) in outputs {
        bind_in_order(loader, paths, move |graph, output| {
            report(graph.add_operator_output(item, &port, output), "bind operator output");
        });
    }
    Ok(())
}

fn port_paths(record: &Record, key: &str) -> Result<Vec<(String, Vec<String>)>, LoadError> {
    let Some(ports) = record.object_field(key)? else {
        return Ok(Vec::new());
    };
    ports
        .iter()
        .map(|(port, value)| Ok((port.clone(), paths_of(port, value)?)))
        .collect()
}

/// Resolve a list of paths and apply `bind` to them in list order.
///
/// Paths can resolve in any order; an item is bound once every path
/// before it in the list has been bound.
fn bind_in_order<F>(loader: &mut Loader<'_>, paths: Vec<String>, bind: F)
where
    F: Fn(&mut SceneGraph, ItemId) + 'static,
{
    if paths.is_empty() {
        return;
    }
    let binding = Rc::new(RefCell::new(OrderedBinding {
        slots: vec![None; paths.len()],
        next: 0,
        bind,
    }));

    for (index, path) in paths.into_iter().enumerate() {
        let binding = Rc::clone(&binding);
        loader.register_construction_callback(path, move |graph, resolved| {
            binding.borrow_mut().resolve(graph, index, resolved);
        });
    }
}

/// Resolved items of a reference list, bound front to back
struct OrderedBinding<F> {
    slots: Vec<Option<ItemId>>,
    /// First slot not bound yet
    next: usize,
    bind: F,
}

impl<F: Fn(&mut SceneGraph, ItemId)> OrderedBinding<F> {
    fn resolve(&mut self, graph: &mut SceneGraph, index: usize, item: ItemId) {
        self.slots[index] = Some(item);
        while let Some(Some(ready)) = self.slots.get(self.next).copied() {
            (self.bind)(graph, ready);
            self.next += 1;
        }
    }
}

impl<F> OrderedBinding<F> {
    /// Resolved items still waiting on an earlier path
    fn stranded(&self) -> usize {
        self.slots.iter().skip(self.next).flatten().count()
    }
}

impl<F> Drop for OrderedBinding<F> {
    fn drop(&mut self) {
        let stranded = self.stranded();
        if stranded > 0 {
            tracing::warn!(
                stranded,
                bound = self.next,
                "references behind an unresolved path were never bound"
            );
        }
    }
}

fn report(result: Result<(), GraphError>, action: &str) {
    if let Err(err) = result {
        tracing::warn!(%err, "failed to {action} while loading");
    }
}
