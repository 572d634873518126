//! Formatter configuration
//!
//! Configuration is read from TOML:
//!
//! ```toml
//! select = { list = ["iteration", "sum#time.duration"] }
//! use_path = true
//! reserved_attributes = [0, 1, 2]
//!
//! [aliases]
//! "sum#time.duration" = "Time (total)"
//! ```
//!
//! With `select = "all"` (or the default) and a `[group_by]` table, only the
//! group-by key and the aggregation result attributes are selected, and the
//! group-by's `use_path` decides whether the region path is included.

pub mod selection;

pub use selection::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::classifier::AttributeSelection;
use crate::error::{ExportError, Result};
use crate::id::AttrId;

/// Formatter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FormatterConfig {
    /// Attribute selection
    pub select: Selection,

    /// Include all nested attributes when selecting a list
    pub use_path: bool,

    /// Column title overrides, keyed by attribute name
    pub aliases: BTreeMap<String, String>,

    /// Aggregation key of the upstream reduction
    pub group_by: Option<GroupBy>,

    /// Aggregation operations of the upstream reduction
    pub aggregate: Vec<AggregateOp>,

    /// Attribute ids skipped when scraping column metadata. `None` means the
    /// bootstrap block.
    pub reserved_attributes: Option<Vec<u32>>,
}

impl FormatterConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExportError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| e.with_context(format!("Failed to parse config file {:?}", path)))
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ExportError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Resolve the selection settings into the classifier's selection mode
    /// and include-path flag.
    pub fn resolve_selection(&self) -> Result<(AttributeSelection, bool)> {
        match &self.select {
            Selection::Default | Selection::All => match &self.group_by {
                Some(group_by) if !group_by.attributes.is_empty() => {
                    let mut names = group_by.attributes.clone();
                    for op in &self.aggregate {
                        let name = op.result_attribute_name().ok_or_else(|| {
                            ExportError::Config(format!(
                                "aggregation '{}' needs a target attribute",
                                op.kind.name()
                            ))
                        })?;
                        names.push(name);
                    }
                    Ok((AttributeSelection::List(names), group_by.use_path))
                }
                _ => Ok((AttributeSelection::All, self.use_path)),
            },
            Selection::None => Ok((AttributeSelection::None, self.use_path)),
            Selection::List(names) => Ok((AttributeSelection::List(names.clone()), self.use_path)),
        }
    }

    /// The reserved attribute set
    pub fn reserved(&self) -> ReservedAttributes {
        match &self.reserved_attributes {
            Some(ids) => ids.iter().copied().map(AttrId).collect(),
            None => ReservedAttributes::bootstrap(),
        }
    }
}
