//! Column classification.
//!
//! Partitions the metadata source's current attribute set into output columns:
//! one column per selected non-nested attribute (titled by its alias if it has
//! one), followed by a single hierarchical `path` column folding every
//! selected nested attribute. The layout is recomputed on every flush, so
//! attributes registered after records were buffered still classify.

use std::collections::BTreeMap;

use crate::config::FormatterConfig;
use crate::error::Result;
use crate::metadata::MetadataSource;
use crate::types::Attribute;

/// Title of the hierarchical column holding all nested attributes.
pub const PATH_COLUMN: &str = "path";

/// Recognized attribute selection modes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttributeSelection {
    /// Every attribute that is neither hidden nor global
    #[default]
    All,
    /// Attributes whose name is listed (plus nested ones with include-path)
    List(Vec<String>),
    /// Nothing
    None,
}

/// One output column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub title: String,
    /// Attributes read by this column. Exactly one unless this is the `path`
    /// column.
    pub attributes: Vec<Attribute>,
    /// Values go through the path interner rather than being written directly
    pub is_hierarchy: bool,
}

impl Column {
    /// Single-attribute column. Attributes stored as immediate values become
    /// scalar columns; reference attributes are rendered through the interner.
    pub fn for_attribute(title: impl Into<String>, attr: &Attribute) -> Self {
        Self {
            title: title.into(),
            attributes: vec![attr.clone()],
            is_hierarchy: !attr.store_as_value(),
        }
    }

    fn path() -> Self {
        Self {
            title: PATH_COLUMN.to_string(),
            attributes: Vec::new(),
            is_hierarchy: true,
        }
    }

    #[inline]
    pub fn is_value(&self) -> bool {
        !self.is_hierarchy
    }

    /// The single attribute of a one-attribute column
    pub fn single_attribute(&self) -> Option<&Attribute> {
        match self.attributes.as_slice() {
            [attr] => Some(attr),
            _ => None,
        }
    }
}

/// Builds the column layout from the current attribute set.
#[derive(Debug, Clone, Default)]
pub struct ColumnClassifier {
    selection: AttributeSelection,
    include_path: bool,
    aliases: BTreeMap<String, String>,
}

impl ColumnClassifier {
    pub fn new(
        selection: AttributeSelection,
        include_path: bool,
        aliases: BTreeMap<String, String>,
    ) -> Self {
        Self {
            selection,
            include_path,
            aliases,
        }
    }

    pub fn from_config(config: &FormatterConfig) -> Result<Self> {
        let (selection, include_path) = config.resolve_selection()?;
        Ok(Self::new(selection, include_path, config.aliases.clone()))
    }

    pub fn with_alias(mut self, name: impl Into<String>, title: impl Into<String>) -> Self {
        self.aliases.insert(name.into(), title.into());
        self
    }

    /// Whether an attribute is selected
    pub fn selects(&self, attr: &Attribute) -> bool {
        match &self.selection {
            AttributeSelection::All => !(attr.is_hidden() || attr.is_global()),
            AttributeSelection::List(names) => {
                (self.include_path && attr.is_nested()) || names.iter().any(|n| *n == attr.name)
            }
            AttributeSelection::None => false,
        }
    }

    /// Column title for a non-nested attribute
    pub fn title_for<'a>(&'a self, attr: &'a Attribute) -> &'a str {
        self.aliases
            .get(&attr.name)
            .map(String::as_str)
            .unwrap_or(attr.name.as_str())
    }

    /// Compute the column layout against the metadata source's current
    /// attributes, in discovery order, with `path` last if non-empty.
    pub fn classify(&self, db: &dyn MetadataSource) -> Vec<Column> {
        let mut columns = Vec::new();
        let mut path = Column::path();

        for attr in db.attributes().iter().filter(|a| self.selects(a)) {
            if attr.is_nested() {
                path.attributes.push(attr.clone());
            } else {
                columns.push(Column::for_attribute(self.title_for(attr), attr));
            }
        }

        if !path.attributes.is_empty() {
            columns.push(path);
        }

        tracing::debug!(
            columns = columns.len(),
            titles = ?columns.iter().map(|c| c.title.as_str()).collect::<Vec<_>>(),
            "classified columns"
        );

        columns
    }
}
