//! Read-only access to attribute and ancestry metadata
//!
//! The exporter never writes back to its metadata source. Everything it needs
//! goes through the [`MetadataSource`] trait:
//!
//! - enumerate all registered attributes
//! - fetch an attribute by id
//! - fetch the node that defines an attribute
//! - fetch an ancestry node by id
//! - list the global (process-wide) entries
//!
//! [`MemoryMetadata`] is an append-only in-memory implementation. It lays out
//! attribute ids the way instrumentation runtimes do: a block of
//! [`BOOTSTRAP_ATTRIBUTE_COUNT`] bootstrap attributes comes first, and every
//! user attribute is defined by a node chain
//! `type -> properties -> user metadata... -> name`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ExportError, Result};
use crate::id::{AttrId, NodeId};
use crate::types::{AttrProperties, AttrType, Attribute, Entry, Node, Record, Variant};

/// Number of attribute ids a runtime allocates before any user attribute.
pub const BOOTSTRAP_ATTRIBUTE_COUNT: u32 = 12;

/// Bootstrap attribute carrying an attribute's name
pub const NAME_ATTR: AttrId = AttrId(0);
/// Bootstrap attribute carrying an attribute's type
pub const TYPE_ATTR: AttrId = AttrId(1);
/// Bootstrap attribute carrying an attribute's property bits
pub const PROP_ATTR: AttrId = AttrId(2);

/// Read-only view of the instrumentation runtime's metadata.
pub trait MetadataSource {
    /// All registered attributes, in registration order.
    fn attributes(&self) -> Vec<Attribute>;

    /// Look up an attribute by id.
    fn attribute(&self, id: AttrId) -> Option<&Attribute>;

    /// The node that defines the given attribute. Its ancestors carry the
    /// attribute's own metadata.
    fn attribute_node(&self, id: AttrId) -> Option<&Node>;

    /// Look up an ancestry node by id.
    fn node(&self, id: NodeId) -> Option<&Node>;

    /// Process-wide entries.
    fn globals(&self) -> Vec<Entry>;
}

/// Iterate from `start` to the root of the ancestry graph, `start` included.
pub fn ancestors(db: &dyn MetadataSource, start: NodeId) -> Ancestors<'_> {
    Ancestors { db, current: start }
}

/// Iterator returned by [`ancestors`].
pub struct Ancestors<'a> {
    db: &'a dyn MetadataSource,
    current: NodeId,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.current.is_valid() {
            return None;
        }
        let node = self.db.node(self.current)?;
        self.current = node.parent;
        Some(node)
    }
}

/// Append-only in-memory metadata store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryMetadata {
    /// Indexed by `AttrId`.
    attributes: Vec<Attribute>,
    /// Defining node per attribute, indexed by `AttrId`.
    definitions: Vec<NodeId>,
    /// Indexed by `NodeId`.
    nodes: Vec<Node>,
    #[serde(default)]
    globals: Vec<Entry>,
}

impl Default for MemoryMetadata {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMetadata {
    /// Create a store holding only the bootstrap attributes.
    pub fn new() -> Self {
        let mut db = Self {
            attributes: Vec::new(),
            definitions: Vec::new(),
            nodes: Vec::new(),
            globals: Vec::new(),
        };

        for id in 0..BOOTSTRAP_ATTRIBUTE_COUNT {
            let (name, attr_type) = match AttrId(id) {
                NAME_ATTR => ("attribute.name".to_string(), AttrType::String),
                TYPE_ATTR => ("attribute.type".to_string(), AttrType::Type),
                PROP_ATTR => ("attribute.prop".to_string(), AttrType::Int),
                _ => (format!("attribute.reserved.{}", id), AttrType::Inv),
            };
            db.attributes.push(Attribute::new(
                AttrId(id),
                name,
                attr_type,
                AttrProperties::value().hidden(),
            ));
            db.definitions.push(NodeId::INVALID);
        }

        db
    }

    /// Ids of the bootstrap block.
    pub fn bootstrap_ids() -> impl Iterator<Item = AttrId> {
        (0..BOOTSTRAP_ATTRIBUTE_COUNT).map(AttrId)
    }

    /// Register a new attribute. Returns its id.
    pub fn create_attribute(
        &mut self,
        name: impl Into<String>,
        attr_type: AttrType,
        properties: AttrProperties,
    ) -> AttrId {
        self.create_attribute_with_metadata(name, attr_type, properties, &[])
    }

    /// Register a new attribute whose defining node carries extra metadata
    /// entries. Metadata attributes must already be registered.
    pub fn create_attribute_with_metadata(
        &mut self,
        name: impl Into<String>,
        attr_type: AttrType,
        properties: AttrProperties,
        metadata: &[(AttrId, Variant)],
    ) -> AttrId {
        let name = name.into();
        let id = AttrId(self.attributes.len() as u32);

        let mut parent = self.make_node(TYPE_ATTR, Variant::Type(attr_type), NodeId::INVALID);
        parent = self.make_node(PROP_ATTR, Variant::Int(property_bits(&properties)), parent);
        for (meta_attr, meta_value) in metadata {
            parent = self.make_node(*meta_attr, meta_value.clone(), parent);
        }
        let definition = self.make_node(NAME_ATTR, Variant::String(name.clone()), parent);

        self.attributes
            .push(Attribute::new(id, name, attr_type, properties));
        self.definitions.push(definition);

        tracing::trace!(?id, "registered attribute");
        id
    }

    /// Append a node to the ancestry graph. `parent` must already exist or be
    /// `NodeId::INVALID`.
    pub fn make_node(&mut self, attribute: AttrId, value: Variant, parent: NodeId) -> NodeId {
        debug_assert!(!parent.is_valid() || parent.index() < self.nodes.len());
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            attribute,
            value,
            parent,
        });
        id
    }

    /// Append a chain of nodes, root-most first, under `parent`. Returns the
    /// leaf node.
    pub fn make_path(&mut self, parent: NodeId, path: &[(AttrId, Variant)]) -> NodeId {
        path.iter().fold(parent, |parent, (attr, value)| {
            self.make_node(*attr, value.clone(), parent)
        })
    }

    /// Record a process-wide entry.
    pub fn set_global(&mut self, entry: Entry) {
        self.globals.push(entry);
    }

    /// Look up an attribute by name.
    pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Check the structural invariants of a deserialized store: ids match
    /// their positions and every parent link points to an earlier node, which
    /// keeps the graph acyclic.
    pub fn validate(&self) -> Result<()> {
        if self.definitions.len() != self.attributes.len() {
            return Err(ExportError::Capture(format!(
                "{} attributes but {} attribute definitions",
                self.attributes.len(),
                self.definitions.len()
            )));
        }
        for (i, attr) in self.attributes.iter().enumerate() {
            if attr.id.index() != i {
                return Err(ExportError::Capture(format!(
                    "attribute {:?} stored at position {}",
                    attr.id, i
                )));
            }
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.id.index() != i {
                return Err(ExportError::Capture(format!(
                    "node {:?} stored at position {}",
                    node.id, i
                )));
            }
            if node.parent.is_valid() && node.parent.index() >= i {
                return Err(ExportError::Capture(format!(
                    "node {:?} has forward parent link {:?}",
                    node.id, node.parent
                )));
            }
        }
        for def in &self.definitions {
            if def.is_valid() && def.index() >= self.nodes.len() {
                return Err(ExportError::Capture(format!(
                    "attribute definition points to missing node {:?}",
                    def
                )));
            }
        }
        Ok(())
    }
}

fn property_bits(p: &AttrProperties) -> i64 {
    let mut bits = 0;
    if p.store_as_value {
        bits |= 0x1;
    }
    if p.nested {
        bits |= 0x2;
    }
    if p.hidden {
        bits |= 0x4;
    }
    if p.global {
        bits |= 0x8;
    }
    bits
}

impl MetadataSource for MemoryMetadata {
    fn attributes(&self) -> Vec<Attribute> {
        self.attributes.clone()
    }

    fn attribute(&self, id: AttrId) -> Option<&Attribute> {
        if id.is_valid() {
            self.attributes.get(id.index())
        } else {
            None
        }
    }

    fn attribute_node(&self, id: AttrId) -> Option<&Node> {
        if !id.is_valid() {
            return None;
        }
        self.definitions
            .get(id.index())
            .and_then(|node| self.node(*node))
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        if id.is_valid() {
            self.nodes.get(id.index())
        } else {
            None
        }
    }

    fn globals(&self) -> Vec<Entry> {
        self.globals.clone()
    }
}

/// A saved measurement session: metadata plus the records to export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capture {
    pub metadata: MemoryMetadata,
    #[serde(default)]
    pub records: Vec<Record>,
}

impl Capture {
    /// Parse a capture from JSON text and validate it.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let capture: Capture = serde_json::from_str(s)?;
        capture.metadata.validate()?;
        Ok(capture)
    }

    /// Load a capture from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExportError::Capture(format!("Failed to read capture {:?}: {}", path, e))
        })?;
        Self::from_json_str(&content)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
