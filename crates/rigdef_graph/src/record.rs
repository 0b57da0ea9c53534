// SPDX-License-Identifier: MIT OR Apache-2.0
//! Serialized record envelope.
//!
//! A record is a JSON-like object carrying at least a name and the type
//! ancestry of the item it describes. Kind-specific keys are read by the
//! decode routines in [`loader`](crate::loader).

use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key holding the ordered type ancestry, most specific first
pub const TYPE_HIERARCHY_KEY: &str = "__typeHierarchy__";
/// Key holding the item name
pub const NAME_KEY: &str = "name";
/// Key holding the item metadata object
pub const METADATA_KEY: &str = "metadata";

/// One serialized item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Map<String, Value>);

impl Record {
    /// Create a record with the envelope keys filled in
    pub fn new<S: AsRef<str>>(name: &str, type_hierarchy: &[S]) -> Self {
        let mut map = Map::new();
        map.insert(
            TYPE_HIERARCHY_KEY.to_string(),
            Value::Array(
                type_hierarchy
                    .iter()
                    .map(|t| Value::String(t.as_ref().to_string()))
                    .collect(),
            ),
        );
        map.insert(NAME_KEY.to_string(), Value::String(name.to_string()));
        Self(map)
    }

    /// Wrap a parsed value, which must be an object
    pub fn from_value(value: Value) -> Result<Self, LoadError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(LoadError::InvalidRecord(format!(
                "expected an object, found {}",
                kind_of(&other)
            ))),
        }
    }

    /// Unwrap into a plain value
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Type ancestry, most specific first
    pub fn type_hierarchy(&self) -> Result<Vec<String>, LoadError> {
        let Some(Value::Array(names)) = self.0.get(TYPE_HIERARCHY_KEY) else {
            return Err(LoadError::InvalidRecord(format!(
                "missing '{TYPE_HIERARCHY_KEY}' list"
            )));
        };
        names
            .iter()
            .map(|n| {
                n.as_str().map(str::to_string).ok_or_else(|| {
                    LoadError::InvalidRecord(format!("'{TYPE_HIERARCHY_KEY}' entries must be strings"))
                })
            })
            .collect()
    }

    /// Item name
    pub fn name(&self) -> Result<&str, LoadError> {
        match self.0.get(NAME_KEY) {
            Some(Value::String(name)) => Ok(name),
            Some(_) => Err(LoadError::InvalidRecord(format!("'{NAME_KEY}' must be a string"))),
            None => Err(LoadError::InvalidRecord(format!("missing '{NAME_KEY}'"))),
        }
    }

    /// Get a raw value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set a raw value
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Optional string field
    pub fn str_field(&self, key: &str) -> Result<Option<&str>, LoadError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(mistyped(key, "a string", other)),
        }
    }

    /// Optional boolean field
    pub fn bool_field(&self, key: &str) -> Result<Option<bool>, LoadError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(mistyped(key, "a boolean", other)),
        }
    }

    /// Optional numeric field
    pub fn f64_field(&self, key: &str) -> Result<Option<f64>, LoadError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(other) => Err(mistyped(key, "a number", other)),
        }
    }

    /// Optional object field
    pub fn object_field(&self, key: &str) -> Result<Option<&Map<String, Value>>, LoadError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(mistyped(key, "an object", other)),
        }
    }

    /// Nested records under `key`; missing means none
    pub fn records(&self, key: &str) -> Result<Vec<Record>, LoadError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items.iter().cloned().map(Record::from_value).collect(),
            Some(other) => Err(mistyped(key, "a list of records", other)),
        }
    }

    /// Referenced paths under `key`: a single path or a list of paths
    pub fn paths(&self, key: &str) -> Result<Vec<String>, LoadError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => paths_of(key, value),
        }
    }
}

/// Read a path or list of paths out of a value
pub(crate) fn paths_of(key: &str, value: &Value) -> Result<Vec<String>, LoadError> {
    match value {
        Value::String(path) => Ok(vec![path.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|i| {
                i.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| mistyped(key, "a path", i))
            })
            .collect(),
        other => Err(mistyped(key, "a path or list of paths", other)),
    }
}

fn mistyped(key: &str, expected: &str, found: &Value) -> LoadError {
    LoadError::InvalidRecord(format!("'{key}' must be {expected}, found {}", kind_of(found)))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
