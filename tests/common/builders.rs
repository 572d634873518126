//! Test data builders for creating metadata stores and records

use jsonsplit::{
    AttrId, AttrProperties, AttrType, Entry, MemoryMetadata, NodeId, Record, Variant,
};

/// Builder for a metadata store with a `function` region attribute
pub struct MetadataBuilder {
    db: MemoryMetadata,
    function: AttrId,
}

impl MetadataBuilder {
    pub fn new() -> Self {
        let mut db = MemoryMetadata::new();
        let function = db.create_attribute("function", AttrType::String, AttrProperties::nested());
        Self { db, function }
    }

    pub fn function(&self) -> AttrId {
        self.function
    }

    /// Register a scalar attribute stored as an immediate value
    pub fn value_attribute(&mut self, name: &str, attr_type: AttrType) -> AttrId {
        self.db
            .create_attribute(name, attr_type, AttrProperties::value())
    }

    /// Build the region chain for `labels`, root-most first. Returns the leaf
    /// or `NodeId::INVALID` for an empty chain.
    pub fn region(&mut self, labels: &[&str]) -> NodeId {
        let steps: Vec<_> = labels
            .iter()
            .map(|l| (self.function, Variant::from(*l)))
            .collect();
        self.db.make_path(NodeId::INVALID, &steps)
    }

    pub fn db(&self) -> &MemoryMetadata {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut MemoryMetadata {
        &mut self.db
    }

    pub fn build(self) -> MemoryMetadata {
        self.db
    }
}

impl Default for MetadataBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for records
#[derive(Default)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, attr: AttrId, value: impl Into<Variant>) -> Self {
        self.record.push(Entry::immediate(attr, value));
        self
    }

    pub fn region(mut self, leaf: NodeId) -> Self {
        if leaf.is_valid() {
            self.record.push(Entry::reference(leaf));
        }
        self
    }

    pub fn build(self) -> Record {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let mut meta = MetadataBuilder::new();
        let b = meta.value_attribute("B", AttrType::Int);
        let leaf = meta.region(&["main", "solve"]);

        let record = RecordBuilder::new().value(b, 5i64).region(leaf).build();
        assert_eq!(record.len(), 2);
        assert!(record.entries()[1].is_reference());
    }
}
