//! Runtime configuration
//!
//! Loaded from TOML. Every key is optional:
//!
//! ```toml
//! entry_point = "xblock.v1"
//! unique_ids = "per_instance"
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Plugin family used when a type does not name one
pub const DEFAULT_ENTRY_POINT: &str = "xblock.v1";

/// How long a generated unique-id default stays stable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniqueIdPolicy {
    /// One id per field per block instance, reused across reads
    #[default]
    PerInstance,
    /// A fresh id on every unset read
    PerRead,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Plugin family the runtime accepts
    pub entry_point: String,
    pub unique_ids: UniqueIdPolicy,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            unique_ids: UniqueIdPolicy::default(),
        }
    }
}

impl CoreConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }
}
