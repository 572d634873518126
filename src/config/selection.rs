//! Attribute selection settings
//!
//! # Main Types
//!
//! - [`Selection`] - Which attributes become output columns
//! - [`GroupBy`] - Aggregation key of an upstream reduction stage
//! - [`AggregateOp`] - One aggregation operation and its result attribute name
//! - [`ReservedAttributes`] - Attribute ids hidden from column metadata

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::id::AttrId;
use crate::metadata::BOOTSTRAP_ATTRIBUTE_COUNT;

/// Which attributes to select
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    /// All attributes, unless a group-by list narrows it down
    #[default]
    Default,
    /// All attributes, unless a group-by list narrows it down
    All,
    /// Nothing
    None,
    /// Exactly the listed attribute names
    List(Vec<String>),
}

/// Aggregation key of the reduction stage feeding records in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GroupBy {
    /// Key attribute names
    pub attributes: Vec<String>,
    /// Whether the nested region path is part of the key
    pub use_path: bool,
}

/// Aggregation operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    Count,
    Sum,
    Min,
    Max,
    Avg,
    InclusiveSum,
    PercentTotal,
}

impl AggregateKind {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateKind::Count => "count",
            AggregateKind::Sum => "sum",
            AggregateKind::Min => "min",
            AggregateKind::Max => "max",
            AggregateKind::Avg => "avg",
            AggregateKind::InclusiveSum => "inclusive_sum",
            AggregateKind::PercentTotal => "percent_total",
        }
    }
}

/// One aggregation operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateOp {
    pub kind: AggregateKind,
    /// Aggregated attribute. Unused for `count`.
    #[serde(default)]
    pub target: Option<String>,
}

impl AggregateOp {
    pub fn count() -> Self {
        Self {
            kind: AggregateKind::Count,
            target: None,
        }
    }

    pub fn new(kind: AggregateKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: Some(target.into()),
        }
    }

    /// Name of the attribute the reduction stage writes this result to.
    /// `None` for a non-count op without a target.
    pub fn result_attribute_name(&self) -> Option<String> {
        match (self.kind, &self.target) {
            (AggregateKind::Count, _) => Some("count".to_string()),
            (kind, Some(target)) => Some(format!("{}#{}", kind.name(), target)),
            (_, None) => None,
        }
    }
}

/// Attribute ids whose entries are never scraped into column metadata.
///
/// The default is the bootstrap block, ids `0..BOOTSTRAP_ATTRIBUTE_COUNT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedAttributes {
    ids: BTreeSet<AttrId>,
}

impl Default for ReservedAttributes {
    fn default() -> Self {
        Self::bootstrap()
    }
}

impl ReservedAttributes {
    pub fn bootstrap() -> Self {
        (0..BOOTSTRAP_ATTRIBUTE_COUNT).map(AttrId).collect()
    }

    pub fn none() -> Self {
        Self {
            ids: BTreeSet::new(),
        }
    }

    #[inline]
    pub fn contains(&self, id: AttrId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<AttrId> for ReservedAttributes {
    fn from_iter<I: IntoIterator<Item = AttrId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}
