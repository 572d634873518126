//! Core data types for the export pipeline
//!
//! This module contains the data model shared by the classifier, the path
//! interner and the exporter.
//!
//! # Main Types
//!
//! - [`AttrType`] - Closed set of attribute value types, with the quoting table
//! - [`Attribute`] - A registered, immutable attribute (name, type, flags)
//! - [`Variant`] - A typed value with its canonical string conversion
//! - [`Node`] - One element of the shared ancestry graph
//! - [`Entry`] - A record's reference to a node or an immediate value
//! - [`Record`] - One measurement snapshot
//!
//! # Quoting
//!
//! Whether a value is written as bare numeric text or as an escaped string is
//! decided by the attribute's [`AttrType`] alone, see [`AttrType::needs_quoting`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::id::{AttrId, NodeId};
use crate::metadata::MetadataSource;

/// Value type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AttrType {
    /// Invalid / unset
    #[default]
    Inv,
    /// User-defined binary blob
    Usr,
    /// Signed integer
    Int,
    /// Unsigned integer
    Uint,
    /// String
    String,
    /// Address
    Addr,
    /// Double-precision floating point
    Double,
    /// Boolean
    Bool,
    /// Attribute type tag
    Type,
    /// Pointer
    Ptr,
}

impl AttrType {
    /// Every type, in declaration order.
    pub const ALL: [AttrType; 10] = [
        AttrType::Inv,
        AttrType::Usr,
        AttrType::Int,
        AttrType::Uint,
        AttrType::String,
        AttrType::Addr,
        AttrType::Double,
        AttrType::Bool,
        AttrType::Type,
        AttrType::Ptr,
    ];

    /// Returns true if values of this type are written as escaped, quoted
    /// strings. Only integer, unsigned and floating-point values go out as
    /// bare numeric text.
    pub fn needs_quoting(&self) -> bool {
        match self {
            AttrType::Int | AttrType::Uint | AttrType::Double => false,
            AttrType::Inv
            | AttrType::Usr
            | AttrType::String
            | AttrType::Addr
            | AttrType::Bool
            | AttrType::Type
            | AttrType::Ptr => true,
        }
    }

    /// Canonical lowercase type name
    pub fn name(&self) -> &'static str {
        match self {
            AttrType::Inv => "inv",
            AttrType::Usr => "usr",
            AttrType::Int => "int",
            AttrType::Uint => "uint",
            AttrType::String => "string",
            AttrType::Addr => "addr",
            AttrType::Double => "double",
            AttrType::Bool => "bool",
            AttrType::Type => "type",
            AttrType::Ptr => "ptr",
        }
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Attribute property flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttrProperties {
    /// Not shown when selecting all attributes
    pub hidden: bool,
    /// Process-wide value, reported once rather than per record
    pub global: bool,
    /// Part of the nested region hierarchy; folded into the `path` column
    pub nested: bool,
    /// Stored as an immediate value rather than in the ancestry graph
    pub store_as_value: bool,
}

impl AttrProperties {
    pub fn value() -> Self {
        Self {
            store_as_value: true,
            ..Self::default()
        }
    }

    pub fn nested() -> Self {
        Self {
            nested: true,
            ..Self::default()
        }
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }
}

/// A registered attribute. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: AttrId,
    pub name: String,
    #[serde(rename = "type")]
    pub attr_type: AttrType,
    #[serde(default)]
    pub properties: AttrProperties,
}

impl Attribute {
    pub fn new(
        id: AttrId,
        name: impl Into<String>,
        attr_type: AttrType,
        properties: AttrProperties,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            attr_type,
            properties,
        }
    }

    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.properties.hidden
    }

    #[inline]
    pub fn is_global(&self) -> bool {
        self.properties.global
    }

    #[inline]
    pub fn is_nested(&self) -> bool {
        self.properties.nested
    }

    #[inline]
    pub fn store_as_value(&self) -> bool {
        self.properties.store_as_value
    }
}

/// A typed attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    #[default]
    Empty,
    Int(i64),
    Uint(u64),
    Double(f64),
    Bool(bool),
    String(String),
    Addr(u64),
    Type(AttrType),
}

impl Variant {
    /// The attribute type this value naturally belongs to
    pub fn attr_type(&self) -> AttrType {
        match self {
            Variant::Empty => AttrType::Inv,
            Variant::Int(_) => AttrType::Int,
            Variant::Uint(_) => AttrType::Uint,
            Variant::Double(_) => AttrType::Double,
            Variant::Bool(_) => AttrType::Bool,
            Variant::String(_) => AttrType::String,
            Variant::Addr(_) => AttrType::Addr,
            Variant::Type(_) => AttrType::Type,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }
}

/// Canonical string conversion. The exporter writes this text as-is and never
/// reformats or rounds it.
impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Empty => Ok(()),
            Variant::Int(v) => write!(f, "{}", v),
            Variant::Uint(v) => write!(f, "{}", v),
            Variant::Double(v) => write!(f, "{}", v),
            Variant::Bool(v) => write!(f, "{}", v),
            Variant::String(s) => f.write_str(s),
            Variant::Addr(v) => write!(f, "0x{:x}", v),
            Variant::Type(t) => f.write_str(t.name()),
        }
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Variant::Int(v)
    }
}

impl From<u64> for Variant {
    fn from(v: u64) -> Self {
        Variant::Uint(v)
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::Double(v)
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Bool(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_string())
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::String(v)
    }
}

/// One element of the shared ancestry graph.
///
/// Nodes are owned by the metadata source; `parent` is a plain index back into
/// the same arena (`NodeId::INVALID` for roots).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub attribute: AttrId,
    pub value: Variant,
    #[serde(default)]
    pub parent: NodeId,
}

/// A record's reference to either an ancestry node or an immediate value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entry {
    /// Reference into the ancestry graph
    Reference(NodeId),
    /// Immediate (attribute, value) pair
    Immediate { attribute: AttrId, value: Variant },
}

impl Entry {
    pub fn reference(node: NodeId) -> Self {
        Entry::Reference(node)
    }

    pub fn immediate(attribute: AttrId, value: impl Into<Variant>) -> Self {
        Entry::Immediate {
            attribute,
            value: value.into(),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Entry::Reference(_))
    }

    /// The referenced node, if this is a reference entry
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Entry::Reference(id) => Some(*id),
            Entry::Immediate { .. } => None,
        }
    }

    /// The attribute this entry carries. For references, that is the
    /// attribute of the referenced node itself (not of its ancestors).
    pub fn attribute(&self, db: &dyn MetadataSource) -> AttrId {
        match self {
            Entry::Reference(id) => db.node(*id).map(|n| n.attribute).unwrap_or(AttrId::INVALID),
            Entry::Immediate { attribute, .. } => *attribute,
        }
    }

    /// The value this entry carries, if it resolves.
    pub fn value<'a>(&'a self, db: &'a dyn MetadataSource) -> Option<&'a Variant> {
        match self {
            Entry::Reference(id) => db.node(*id).map(|n| &n.value),
            Entry::Immediate { value, .. } => Some(value),
        }
    }
}

/// One measurement snapshot: entries in producer insertion order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    entries: Vec<Entry>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub fn with(mut self, entry: Entry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }
}

impl From<Vec<Entry>> for Record {
    fn from(entries: Vec<Entry>) -> Self {
        Self { entries }
    }
}

impl FromIterator<Entry> for Record {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
