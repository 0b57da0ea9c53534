// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rig definition files.
//!
//! A file holds either one root record or a list of root records, written
//! as JSON (`.json`) or RON (anything else).

use anyhow::{bail, Context};
use rigdef_graph::Record;
use serde_json::Value;
use std::path::Path;

/// Text encodings accepted for rig files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigFormat {
    /// JSON object or array
    Json,
    /// RON map or list
    Ron,
}

impl RigFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Ron,
        }
    }
}

/// Read the root records of a rig file
pub fn read_records(path: &Path) -> anyhow::Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading rig file {}", path.display()))?;
    parse_records(&content, RigFormat::from_path(path))
        .with_context(|| format!("parsing rig file {}", path.display()))
}

/// Parse root records from text
pub fn parse_records(content: &str, format: RigFormat) -> anyhow::Result<Vec<Record>> {
    let value: Value = match format {
        RigFormat::Json => serde_json::from_str(content)?,
        RigFormat::Ron => ron::from_str(content)?,
    };

    let values = match value {
        Value::Array(values) => values,
        Value::Object(_) => vec![value],
        other => bail!("expected a record or a list of records, found {other}"),
    };
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            Record::from_value(value).with_context(|| format!("root record {index}"))
        })
        .collect()
}
