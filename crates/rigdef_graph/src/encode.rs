// SPDX-License-Identifier: MIT OR Apache-2.0
//! Record encoding, the inverse of the loader's decode step.
//!
//! Owned items are nested as records; every other reference is written as
//! a path so the loader can resolve it again.

use crate::error::GraphError;
use crate::graph::SceneGraph;
use crate::item::ItemId;
use crate::kind::{AttributeValue, ItemKind};
use crate::record::{Record, METADATA_KEY};
use crate::value::ValueBridge;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

/// Encode `id` and everything it owns
pub fn encode_item(graph: &SceneGraph, bridge: &dyn ValueBridge, id: ItemId) -> Result<Record, GraphError> {
    let item = graph.item(id).ok_or(GraphError::UnknownItem(id))?;
    let mut record = Record::new(&item.name, item.type_hierarchy());

    if !item.metadata().is_empty() {
        let metadata: Map<String, Value> = item
            .metadata()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        record.insert(METADATA_KEY, Value::Object(metadata));
    }

    match &item.kind {
        ItemKind::SceneItem => {}
        ItemKind::Object3D(object) => {
            record.insert("xfo", bridge.encode(&object.xfo));
            record.insert("visible", json!(object.visible));
            if let Some(color) = &object.color {
                record.insert("color", json!(color));
            }
            record.insert("attributeGroups", encode_all(graph, bridge, &object.attribute_groups)?);
            record.insert("children", encode_all(graph, bridge, &object.children)?);
        }
        ItemKind::AttributeGroup(group) => {
            record.insert("attributes", encode_all(graph, bridge, &group.attributes)?);
        }
        ItemKind::Attribute(attribute) => {
            let value = match &attribute.value {
                AttributeValue::Bool(b) => json!(b),
                AttributeValue::Scalar(s) => json!(s),
                AttributeValue::Integer(i) => json!(i),
                AttributeValue::String(s) => json!(s),
                AttributeValue::Color(c) => bridge.encode(c),
            };
            record.insert("value", value);
            if let Some(min) = attribute.min {
                record.insert("min", json!(min));
            }
            if let Some(max) = attribute.max {
                record.insert("max", json!(max));
            }
            if let Some(connection) = attribute.connection {
                record.insert("connection", json!(path_of(graph, connection)?));
            }
        }
        ItemKind::Constraint(constraint) => {
            record.insert("maintainOffset", json!(constraint.maintain_offset));
            if let Some(constrainee) = constraint.constrainee {
                record.insert("constrainee", json!(path_of(graph, constrainee)?));
            }
            record.insert("constrainers", paths(graph, &constraint.constrainers)?);
        }
        ItemKind::Operator(operator) => {
            if let Some(solver_type) = &operator.solver_type {
                record.insert("solverTypeName", json!(solver_type));
            }
            record.insert("inputs", ports(graph, &operator.inputs)?);
            record.insert("outputs", ports(graph, &operator.outputs)?);
        }
    }

    Ok(record)
}

fn encode_all(graph: &SceneGraph, bridge: &dyn ValueBridge, ids: &[ItemId]) -> Result<Value, GraphError> {
    ids.iter()
        .map(|id| encode_item(graph, bridge, *id).map(Record::into_value))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn path_of(graph: &SceneGraph, id: ItemId) -> Result<String, GraphError> {
    graph.path(id).ok_or(GraphError::UnknownItem(id))
}

fn paths(graph: &SceneGraph, ids: &[ItemId]) -> Result<Value, GraphError> {
    ids.iter()
        .map(|id| path_of(graph, *id).map(Value::String))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn ports(graph: &SceneGraph, ports: &IndexMap<String, Vec<ItemId>>) -> Result<Value, GraphError> {
    let mut map = Map::new();
    for (port, ids) in ports {
        map.insert(port.clone(), paths(graph, ids)?);
    }
    Ok(Value::Object(map))
}
