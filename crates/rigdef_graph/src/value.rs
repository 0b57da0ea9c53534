// SPDX-License-Identifier: MIT OR Apache-2.0
//! Value bridge for numeric leaf values.
//!
//! Transforms, vectors and colors are opaque to the graph. They are built
//! by type name and handled as a bag of named fields; any arithmetic on
//! them belongs to whoever evaluates the rig.

use crate::error::ValueError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Record key carrying a value's type name
pub const VALUE_TYPE_KEY: &str = "__valueType__";

/// Opaque numeric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeValue {
    /// Value type name (e.g. `Xfo`, `Vec3`)
    pub type_name: String,
    /// Named fields in declaration order
    pub fields: IndexMap<String, Value>,
}

impl BridgeValue {
    /// Get a field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Interface to the external value types
pub trait ValueBridge {
    /// Build a value of the named type with default field values
    fn construct(&self, type_name: &str) -> Result<BridgeValue, ValueError>;

    /// Compare two values
    fn compare(&self, a: &BridgeValue, b: &BridgeValue) -> bool {
        a == b
    }

    /// Read a named field
    fn get_field<'v>(&self, value: &'v BridgeValue, field: &str) -> Result<&'v Value, ValueError> {
        value.fields.get(field).ok_or_else(|| ValueError::UnknownField {
            type_name: value.type_name.clone(),
            field: field.to_string(),
        })
    }

    /// Write a named field; the field must exist on the type
    fn set_field(&self, value: &mut BridgeValue, field: &str, data: Value) -> Result<(), ValueError> {
        match value.fields.get_mut(field) {
            Some(slot) => {
                *slot = data;
                Ok(())
            }
            None => Err(ValueError::UnknownField {
                type_name: value.type_name.clone(),
                field: field.to_string(),
            }),
        }
    }

    /// Decode a serialized value.
    ///
    /// `expected` is used when the record carries no type key.
    fn decode(&self, data: &Value, expected: &str) -> Result<BridgeValue, ValueError> {
        let Some(map) = data.as_object() else {
            return Err(ValueError::Malformed {
                type_name: expected.to_string(),
                reason: "expected an object".to_string(),
            });
        };
        let type_name = match map.get(VALUE_TYPE_KEY) {
            Some(Value::String(name)) => name.as_str(),
            Some(_) => {
                return Err(ValueError::Malformed {
                    type_name: expected.to_string(),
                    reason: format!("'{VALUE_TYPE_KEY}' must be a string"),
                })
            }
            None => expected,
        };
        let mut value = self.construct(type_name)?;
        for (key, field) in map.iter().filter(|(k, _)| k.as_str() != VALUE_TYPE_KEY) {
            self.set_field(&mut value, key, field.clone())?;
        }
        Ok(value)
    }

    /// Encode a value for serialization
    fn encode(&self, value: &BridgeValue) -> Value {
        let mut map = serde_json::Map::new();
        map.insert(VALUE_TYPE_KEY.to_string(), Value::String(value.type_name.clone()));
        for (key, field) in &value.fields {
            map.insert(key.clone(), field.clone());
        }
        Value::Object(map)
    }
}

/// Bridge knowing the standard rig math types
#[derive(Debug, Clone, Default)]
pub struct DefaultValueBridge;

impl DefaultValueBridge {
    fn defaults(type_name: &str) -> Option<Vec<(&'static str, Value)>> {
        let vec3 = || json!({ "x": 0.0, "y": 0.0, "z": 0.0 });
        let fields = match type_name {
            "Vec2" => vec![("x", json!(0.0)), ("y", json!(0.0))],
            "Vec3" => vec![("x", json!(0.0)), ("y", json!(0.0)), ("z", json!(0.0))],
            "Vec4" => vec![("x", json!(0.0)), ("y", json!(0.0)), ("z", json!(0.0)), ("t", json!(0.0))],
            "Quat" => vec![("v", vec3()), ("w", json!(1.0))],
            "Euler" => vec![("x", json!(0.0)), ("y", json!(0.0)), ("z", json!(0.0)), ("ro", json!(0))],
            "Xfo" => vec![
                ("tr", vec3()),
                ("ori", json!({ "v": { "x": 0.0, "y": 0.0, "z": 0.0 }, "w": 1.0 })),
                ("sc", json!({ "x": 1.0, "y": 1.0, "z": 1.0 })),
            ],
            "Color" => vec![("r", json!(0.0)), ("g", json!(0.0)), ("b", json!(0.0)), ("a", json!(1.0))],
            "Mat44" => vec![
                ("row0", json!([1.0, 0.0, 0.0, 0.0])),
                ("row1", json!([0.0, 1.0, 0.0, 0.0])),
                ("row2", json!([0.0, 0.0, 1.0, 0.0])),
                ("row3", json!([0.0, 0.0, 0.0, 1.0])),
            ],
            _ => return None,
        };
        Some(fields)
    }
}

impl ValueBridge for DefaultValueBridge {
    fn construct(&self, type_name: &str) -> Result<BridgeValue, ValueError> {
        let fields = Self::defaults(type_name)
            .ok_or_else(|| ValueError::UnknownType(type_name.to_string()))?;
        Ok(BridgeValue {
            type_name: type_name.to_string(),
            fields: fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        })
    }
}
