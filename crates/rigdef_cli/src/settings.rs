// SPDX-License-Identifier: MIT OR Apache-2.0
//! Settings file for the command line front end

use anyhow::Context;
use rigdef_graph::{LoadSettings, TraversalSettings};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Loader and traversal configuration read from a RON file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigdefSettings {
    /// Loader configuration
    pub load: LoadSettings,
    /// Traversal configuration
    pub traversal: TraversalSettings,
}

impl RigdefSettings {
    /// Load settings from a file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        Self::from_ron(&content).with_context(|| format!("parsing settings file {}", path.display()))
    }

    /// Parse settings from RON text
    pub fn from_ron(content: &str) -> anyhow::Result<Self> {
        Ok(ron::from_str(content)?)
    }
}
