//! Split-JSON exporter.
//!
//! Buffers records during measurement and writes them as one document at
//! flush time:
//!
//! ```text
//! {
//!   "data": [
//!     [ 5, 1 ],
//!     [ 7, 2 ]
//!   ],
//!   "columns": [ "iterations", "path" ],
//!   "column_metadata": [ { "is_value": true }, { "is_value": false }  ],
//!   "nodes": [ { "label": "main", "column": "path" }, { "label": "solve", "column": "path", "parent": 0 }, ... ],
//!   "cluster": "rzwhamo"
//! }
//! ```
//!
//! Hierarchical cells hold ids into `nodes`. Scalar cells hold the value
//! itself: bare numeric text when both the attribute and the value are
//! integer, unsigned or floating-point, an escaped string otherwise. Missing
//! and empty values are `null`.
//! Process-wide globals follow as extra top-level string pairs.

use std::io::Write;
use std::time::Instant;

use crate::buffer::RecordBuffer;
use crate::classifier::{Column, ColumnClassifier};
use crate::config::{FormatterConfig, ReservedAttributes};
use crate::error::{Result, ResultExt};
use crate::id::{AttrId, NodeId, PathId};
use crate::interner::{PathInterner, PathNodeRecord};
use crate::metadata::{ancestors, MetadataSource};
use crate::types::{Attribute, Entry, Record, Variant};

/// Summary of one flush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushStats {
    pub rows: usize,
    pub columns: usize,
    pub nodes: usize,
    pub globals: usize,
}

/// Collects records and writes them in the split-JSON layout.
///
/// `process_record` may be called from any number of threads. `flush` must
/// only run once producers are done.
#[derive(Debug, Default)]
pub struct JsonSplitExporter {
    classifier: ColumnClassifier,
    reserved: ReservedAttributes,
    records: RecordBuffer,
    hierarchy: PathInterner,
}

impl JsonSplitExporter {
    pub fn new(classifier: ColumnClassifier, reserved: ReservedAttributes) -> Self {
        Self {
            classifier,
            reserved,
            records: RecordBuffer::new(),
            hierarchy: PathInterner::new(),
        }
    }

    pub fn from_config(config: &FormatterConfig) -> Result<Self> {
        Ok(Self::new(
            ColumnClassifier::from_config(config)?,
            config.reserved(),
        ))
    }

    /// Buffer one record for export.
    pub fn process_record(&self, record: Record) {
        self.records.process_record(record);
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Write the document for every buffered record.
    pub fn flush<W: Write + ?Sized>(
        &self,
        db: &dyn MetadataSource,
        out: &mut W,
    ) -> Result<FlushStats> {
        let started = Instant::now();
        let columns = self.classifier.classify(db);

        let rows = self
            .records
            .with_records(|records| self.write_data(db, &columns, records, out))
            .context("Failed to write data rows")?;

        self.write_columns(&columns, out)
            .context("Failed to write columns")?;
        self.write_column_metadata(db, &columns, out)
            .context("Failed to write column metadata")?;
        let nodes = self.write_nodes(out).context("Failed to write nodes")?;
        let globals = self
            .write_globals(db, out)
            .context("Failed to write globals")?;
        out.write_all(b"\n}\n")?;
        out.flush()?;

        let stats = FlushStats {
            rows,
            columns: columns.len(),
            nodes,
            globals,
        };
        tracing::debug!(
            rows = stats.rows,
            columns = stats.columns,
            nodes = stats.nodes,
            globals = stats.globals,
            elapsed_us = started.elapsed().as_micros() as u64,
            "flushed split-json document"
        );

        Ok(stats)
    }

    /// Flush into a string.
    pub fn flush_to_string(&self, db: &dyn MetadataSource) -> Result<String> {
        let mut buf: Vec<u8> = Vec::new();
        self.flush(db, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn write_data<W: Write + ?Sized>(
        &self,
        db: &dyn MetadataSource,
        columns: &[Column],
        records: &[Record],
        out: &mut W,
    ) -> std::io::Result<usize> {
        out.write_all(b"{\n  \"data\": [")?;

        for (row, record) in records.iter().enumerate() {
            out.write_all(if row > 0 { ",\n    [ " } else { "\n    [ " }.as_bytes())?;
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    out.write_all(b", ")?;
                }
                if column.is_hierarchy {
                    self.write_hierarchy_entry(db, record, column, out)?;
                } else if let Some(attr) = column.single_attribute() {
                    write_immediate_entry(db, record, attr, out)?;
                } else {
                    out.write_all(b"null")?;
                }
            }
            out.write_all(b" ]")?;
        }

        out.write_all(b"\n  ]")?;
        Ok(records.len())
    }

    fn write_hierarchy_entry<W: Write + ?Sized>(
        &self,
        db: &dyn MetadataSource,
        record: &Record,
        column: &Column,
        out: &mut W,
    ) -> std::io::Result<()> {
        let path = hierarchy_path(db, record, &column.attributes);
        let id = self.hierarchy.get_id(path.as_slice(), &column.title);
        write_path_id(id, out)
    }

    fn write_columns<W: Write + ?Sized>(&self, columns: &[Column], out: &mut W) -> Result<()> {
        out.write_all(b",\n  \"columns\": [")?;
        for (i, column) in columns.iter().enumerate() {
            out.write_all(if i > 0 { ", " } else { " " }.as_bytes())?;
            write_esc_string(out, &column.title)?;
        }
        out.write_all(b" ]")?;
        Ok(())
    }

    fn write_column_metadata<W: Write + ?Sized>(
        &self,
        db: &dyn MetadataSource,
        columns: &[Column],
        out: &mut W,
    ) -> Result<()> {
        out.write_all(b",\n  \"column_metadata\": [")?;
        for (i, column) in columns.iter().enumerate() {
            out.write_all(if i > 0 { " }, { " } else { " { " }.as_bytes())?;
            write!(
                out,
                "\"is_value\": {}",
                if column.is_value() { "true" } else { "false" }
            )?;
            if let Some(attr) = column.single_attribute() {
                for (name, value) in self.attribute_metadata(db, attr) {
                    out.write_all(b", ")?;
                    write_esc_string(out, &name)?;
                    out.write_all(b": ")?;
                    write_esc_string(out, &value)?;
                }
            }
        }
        if !columns.is_empty() {
            out.write_all(b" } ")?;
        }
        out.write_all(b" ]")?;
        Ok(())
    }

    /// Name/value pairs from the ancestors of an attribute's defining node,
    /// leaf-most first, skipping reserved and hidden attributes.
    pub fn attribute_metadata(
        &self,
        db: &dyn MetadataSource,
        attr: &Attribute,
    ) -> Vec<(String, String)> {
        let start = db
            .attribute_node(attr.id)
            .map(|n| n.parent)
            .unwrap_or(NodeId::INVALID);

        ancestors(db, start)
            .filter_map(|node| {
                let Some(meta) = db.attribute(node.attribute) else {
                    tracing::warn!(attribute = ?node.attribute, column = %attr.name, "unknown metadata attribute");
                    return None;
                };
                if self.reserved.contains(meta.id) || meta.is_hidden() {
                    return None;
                }
                Some((meta.name.clone(), node.value.to_string()))
            })
            .collect()
    }

    fn write_nodes<W: Write + ?Sized>(&self, out: &mut W) -> Result<usize> {
        let nodes = self.hierarchy.write_nodes();
        out.write_all(b",\n  \"nodes\": [")?;
        for (i, node) in nodes.iter().enumerate() {
            out.write_all(if i > 0 { ", " } else { " " }.as_bytes())?;
            write_node(node, out)?;
        }
        out.write_all(b" ]")?;
        Ok(nodes.len())
    }

    fn write_globals<W: Write + ?Sized>(
        &self,
        db: &dyn MetadataSource,
        out: &mut W,
    ) -> Result<usize> {
        let mut written = 0;
        for (id, value) in merge_globals(db) {
            let Some(attr) = db.attribute(id) else {
                tracing::warn!(attribute = ?id, "skipping global with unknown attribute");
                continue;
            };
            out.write_all(b",\n  ")?;
            write_esc_string(out, &attr.name)?;
            out.write_all(b": ")?;
            write_esc_string(out, &value)?;
            written += 1;
        }
        Ok(written)
    }
}

/// Labels of the nodes in `record`'s ancestry whose attribute is one of
/// `attrs`, root-most first.
///
/// Each reference entry is walked leaf to root and the combined sequence is
/// reversed once at the end.
pub fn hierarchy_path(db: &dyn MetadataSource, record: &Record, attrs: &[Attribute]) -> Vec<String> {
    let mut path: Vec<String> = record
        .iter()
        .filter_map(Entry::node)
        .flat_map(|start| ancestors(db, start))
        .filter(|node| attrs.iter().any(|a| a.id == node.attribute))
        .map(|node| node.value.to_string())
        .collect();
    path.reverse();
    path
}

/// Fold the global entries into one string per attribute, in first-seen
/// attribute order. Ancestry-backed values are joined root-to-leaf with `/`.
pub fn merge_globals(db: &dyn MetadataSource) -> Vec<(AttrId, String)> {
    let mut merged: Vec<(AttrId, String)> = Vec::new();

    fn slot(merged: &mut Vec<(AttrId, String)>, id: AttrId) -> &mut String {
        let pos = match merged.iter().position(|(a, _)| *a == id) {
            Some(pos) => pos,
            None => {
                merged.push((id, String::new()));
                merged.len() - 1
            }
        };
        &mut merged[pos].1
    }

    for entry in db.globals() {
        match entry {
            Entry::Reference(start) => {
                for node in ancestors(db, start) {
                    let value = slot(&mut merged, node.attribute);
                    let mut s = node.value.to_string();
                    if !value.is_empty() {
                        s.push('/');
                        s.push_str(value);
                    }
                    *value = s;
                }
            }
            Entry::Immediate { attribute, value } => {
                *slot(&mut merged, attribute) = value.to_string();
            }
        }
    }

    merged
}

fn write_immediate_entry<W: Write + ?Sized>(
    db: &dyn MetadataSource,
    record: &Record,
    attr: &Attribute,
    out: &mut W,
) -> std::io::Result<()> {
    let value = record
        .iter()
        .find(|e| e.attribute(db) == attr.id)
        .and_then(|e| e.value(db));

    match value {
        None | Some(Variant::Empty) => out.write_all(b"null"),
        // Bare text only when both the column and the value are numeric
        Some(value)
            if attr.attr_type.needs_quoting() || value.attr_type().needs_quoting() =>
        {
            write_esc_string(out, &value.to_string())
        }
        Some(value) => write!(out, "{}", value),
    }
}

fn write_path_id<W: Write + ?Sized>(id: PathId, out: &mut W) -> std::io::Result<()> {
    if id.is_valid() {
        write!(out, "{}", id.0)
    } else {
        out.write_all(b"null")
    }
}

fn write_node<W: Write + ?Sized>(node: &PathNodeRecord, out: &mut W) -> std::io::Result<()> {
    out.write_all(b"{ \"label\": ")?;
    write_esc_string(out, &node.label)?;
    out.write_all(b", \"column\": ")?;
    write_esc_string(out, &node.column)?;
    if let Some(parent) = node.parent {
        write!(out, ", \"parent\": {}", parent.0)?;
    }
    out.write_all(b" }")
}

/// Write `s` as a quoted JSON string.
fn write_esc_string<W: Write + ?Sized>(out: &mut W, s: &str) -> std::io::Result<()> {
    serde_json::to_writer(&mut *out, s).map_err(std::io::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::AttributeSelection;
    use crate::metadata::{Capture, MemoryMetadata};
    use crate::types::{AttrProperties, AttrType, Variant};
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    struct Fixture {
        db: MemoryMetadata,
        b: AttrId,
        function: AttrId,
    }

    fn fixture() -> Fixture {
        let mut db = MemoryMetadata::new();
        let b = db.create_attribute("B", AttrType::Int, AttrProperties::value());
        let function = db.create_attribute("function", AttrType::String, AttrProperties::nested());
        Fixture { db, b, function }
    }

    fn record(f: &mut Fixture, b: i64, path: &[&str]) -> Record {
        let steps: Vec<_> = path.iter().map(|l| (f.function, Variant::from(*l))).collect();
        let leaf = f.db.make_path(NodeId::INVALID, &steps);
        Record::new()
            .with(Entry::immediate(f.b, b))
            .with(Entry::reference(leaf))
    }

    fn parse(doc: &str) -> Value {
        serde_json::from_str(doc).expect("document is valid JSON")
    }

    #[test]
    fn test_end_to_end_document_text() {
        let mut f = fixture();
        let exporter = JsonSplitExporter::default();
        exporter.process_record(record(&mut f, 5, &["X", "Y"]));
        exporter.process_record(record(&mut f, 7, &["X", "Z"]));

        let doc = exporter.flush_to_string(&f.db).unwrap();
        let expected = concat!(
            "{\n",
            "  \"data\": [\n",
            "    [ 5, 1 ],\n",
            "    [ 7, 2 ]\n",
            "  ],\n",
            "  \"columns\": [ \"B\", \"path\" ],\n",
            "  \"column_metadata\": [ { \"is_value\": true }, { \"is_value\": false }  ],\n",
            "  \"nodes\": [ { \"label\": \"X\", \"column\": \"path\" }, ",
            "{ \"label\": \"Y\", \"column\": \"path\", \"parent\": 0 }, ",
            "{ \"label\": \"Z\", \"column\": \"path\", \"parent\": 0 } ]\n",
            "}\n",
        );
        assert_eq!(doc, expected);
    }

    #[test]
    fn test_empty_export_is_valid_json() {
        let f = fixture();
        let exporter = JsonSplitExporter::new(
            ColumnClassifier::new(AttributeSelection::None, false, BTreeMap::new()),
            ReservedAttributes::bootstrap(),
        );
        let doc = parse(&exporter.flush_to_string(&f.db).unwrap());
        assert_eq!(doc["data"], json!([]));
        assert_eq!(doc["columns"], json!([]));
        assert_eq!(doc["column_metadata"], json!([]));
        assert_eq!(doc["nodes"], json!([]));
    }

    #[test]
    fn test_missing_values_render_null() {
        let mut f = fixture();
        let exporter = JsonSplitExporter::default();
        exporter.process_record(Record::new());
        exporter.process_record(Record::new().with(Entry::immediate(f.b, 3i64)));
        exporter.process_record(record(&mut f, 1, &[]));

        let doc = parse(&exporter.flush_to_string(&f.db).unwrap());
        assert_eq!(doc["data"], json!([[null, null], [3, null], [1, null]]));
        assert_eq!(doc["nodes"], json!([]));
    }

    #[test]
    fn test_unknown_node_reference_degrades_to_null() {
        let f = fixture();
        let exporter = JsonSplitExporter::default();
        exporter.process_record(Record::new().with(Entry::reference(NodeId(90_000))));

        let doc = parse(&exporter.flush_to_string(&f.db).unwrap());
        assert_eq!(doc["data"], json!([[null, null]]));
    }

    #[test]
    fn test_string_values_are_escaped() {
        let mut db = MemoryMetadata::new();
        let name = db.create_attribute("name", AttrType::String, AttrProperties::value());
        let exporter = JsonSplitExporter::default();
        exporter.process_record(
            Record::new().with(Entry::immediate(name, "say \"hi\"\n\tnow\\")),
        );

        let text = exporter.flush_to_string(&db).unwrap();
        assert!(text.contains(r#""say \"hi\"\n\tnow\\""#));
        let doc = parse(&text);
        assert_eq!(doc["data"][0][0], json!("say \"hi\"\n\tnow\\"));
    }

    #[test]
    fn test_quoting_follows_attribute_type() {
        let mut db = MemoryMetadata::new();
        let i = db.create_attribute("i", AttrType::Int, AttrProperties::value());
        let u = db.create_attribute("u", AttrType::Uint, AttrProperties::value());
        let d = db.create_attribute("d", AttrType::Double, AttrProperties::value());
        let b = db.create_attribute("b", AttrType::Bool, AttrProperties::value());
        let a = db.create_attribute("a", AttrType::Addr, AttrProperties::value());

        let exporter = JsonSplitExporter::default();
        exporter.process_record(
            Record::new()
                .with(Entry::immediate(i, -4i64))
                .with(Entry::immediate(u, 18u64))
                .with(Entry::immediate(d, 2.5))
                .with(Entry::immediate(b, true))
                .with(Entry::immediate(a, Variant::Addr(0x10))),
        );

        let text = exporter.flush_to_string(&db).unwrap();
        assert!(text.contains(r#"[ -4, 18, 2.5, "true", "0x10" ]"#));
    }

    #[test]
    fn test_string_value_in_numeric_column_is_quoted() {
        let mut db = MemoryMetadata::new();
        let i = db.create_attribute("i", AttrType::Int, AttrProperties::value());
        let capture = Capture {
            metadata: db,
            records: vec![Record::new().with(Entry::immediate(i, "abc"))],
        };
        let capture = Capture::from_json_str(&capture.to_json_string().unwrap()).unwrap();

        let exporter = JsonSplitExporter::default();
        for record in capture.records {
            exporter.process_record(record);
        }
        let doc = parse(&exporter.flush_to_string(&capture.metadata).unwrap());
        assert_eq!(doc["data"], json!([["abc"]]));
    }

    #[test]
    fn test_empty_value_renders_null() {
        let mut db = MemoryMetadata::new();
        let i = db.create_attribute("i", AttrType::Int, AttrProperties::value());
        let s = db.create_attribute("s", AttrType::String, AttrProperties::value());

        let exporter = JsonSplitExporter::default();
        exporter.process_record(
            Record::new()
                .with(Entry::immediate(i, Variant::Empty))
                .with(Entry::immediate(s, Variant::Empty)),
        );

        let text = exporter.flush_to_string(&db).unwrap();
        assert!(text.contains("[ null, null ]"));
        let doc = parse(&text);
        assert_eq!(doc["columns"], json!(["i", "s"]));
        assert_eq!(doc["data"], json!([[null, null]]));
    }

    #[test]
    fn test_numeric_value_in_numeric_column_stays_bare() {
        let mut db = MemoryMetadata::new();
        let i = db.create_attribute("i", AttrType::Int, AttrProperties::value());
        let exporter = JsonSplitExporter::default();
        exporter.process_record(Record::new().with(Entry::immediate(i, 1.5)));

        let text = exporter.flush_to_string(&db).unwrap();
        assert!(text.contains("[ 1.5 ]"));
    }

    #[test]
    fn test_column_metadata_bytes() {
        let mut db = MemoryMetadata::new();
        let one = JsonSplitExporter::default();
        assert!(one
            .flush_to_string(&db)
            .unwrap()
            .contains("\"column_metadata\": [ ],"));

        db.create_attribute("i", AttrType::Int, AttrProperties::value());
        let two = JsonSplitExporter::default();
        assert!(two
            .flush_to_string(&db)
            .unwrap()
            .contains("\"column_metadata\": [ { \"is_value\": true }  ],"));
    }

    #[test]
    fn test_reference_entry_matches_scalar_column() {
        let mut db = MemoryMetadata::new();
        let rank = db.create_attribute("rank", AttrType::Int, AttrProperties::value());
        let node = db.make_node(rank, Variant::Int(3), NodeId::INVALID);

        let exporter = JsonSplitExporter::default();
        exporter.process_record(Record::new().with(Entry::reference(node)));
        let doc = parse(&exporter.flush_to_string(&db).unwrap());
        assert_eq!(doc["data"], json!([[3]]));
    }

    #[test]
    fn test_first_matching_entry_wins() {
        let mut f = fixture();
        let exporter = JsonSplitExporter::default();
        let rec = record(&mut f, 1, &["main"]).with(Entry::immediate(f.b, 2i64));
        exporter.process_record(rec);

        let doc = parse(&exporter.flush_to_string(&f.db).unwrap());
        assert_eq!(doc["data"][0][0], json!(1));
    }

    #[test]
    fn test_reference_attribute_column_uses_interner() {
        let mut db = MemoryMetadata::new();
        let phase = db.create_attribute("phase", AttrType::String, AttrProperties::default());
        let outer = db.make_node(phase, Variant::from("init"), NodeId::INVALID);
        let inner = db.make_node(phase, Variant::from("read"), outer);

        let exporter = JsonSplitExporter::default();
        exporter.process_record(Record::new().with(Entry::reference(inner)));
        exporter.process_record(Record::new().with(Entry::reference(outer)));

        let doc = parse(&exporter.flush_to_string(&db).unwrap());
        assert_eq!(doc["columns"], json!(["phase"]));
        assert_eq!(doc["column_metadata"], json!([{ "is_value": false }]));
        assert_eq!(doc["data"], json!([[1], [0]]));
        assert_eq!(
            doc["nodes"],
            json!([
                { "label": "init", "column": "phase" },
                { "label": "read", "column": "phase", "parent": 0 }
            ])
        );
    }

    #[test]
    fn test_path_only_collects_column_attributes() {
        let mut db = MemoryMetadata::new();
        let function = db.create_attribute("function", AttrType::String, AttrProperties::nested());
        let phase = db.create_attribute("phase", AttrType::String, AttrProperties::default());
        let leaf = db.make_path(
            NodeId::INVALID,
            &[
                (function, Variant::from("main")),
                (phase, Variant::from("setup")),
                (function, Variant::from("init")),
            ],
        );
        let rec = Record::new().with(Entry::reference(leaf));

        let attrs = vec![db.attribute(function).unwrap().clone()];
        assert_eq!(hierarchy_path(&db, &rec, &attrs), vec!["main", "init"]);
    }

    #[test]
    fn test_path_spans_multiple_reference_entries() {
        let mut db = MemoryMetadata::new();
        let function = db.create_attribute("function", AttrType::String, AttrProperties::nested());
        let region = db.create_attribute("region", AttrType::String, AttrProperties::nested());
        let f = db.make_path(
            NodeId::INVALID,
            &[(function, Variant::from("main")), (function, Variant::from("solve"))],
        );
        let r = db.make_node(region, Variant::from("comm"), NodeId::INVALID);
        let rec = Record::new().with(Entry::reference(f)).with(Entry::reference(r));

        let attrs: Vec<_> = [function, region]
            .iter()
            .map(|id| db.attribute(*id).unwrap().clone())
            .collect();
        // Collected leaf-to-root per entry, then reversed as a whole
        assert_eq!(hierarchy_path(&db, &rec, &attrs), vec!["comm", "main", "solve"]);
    }

    #[test]
    fn test_column_metadata_scrape() {
        let mut db = MemoryMetadata::new();
        let unit = db.create_attribute("unit", AttrType::String, AttrProperties::value());
        let secret = db.create_attribute("secret", AttrType::String, AttrProperties::value().hidden());
        let class = db.create_attribute("class.aggregatable", AttrType::Bool, AttrProperties::value());
        let time = db.create_attribute_with_metadata(
            "time",
            AttrType::Double,
            AttrProperties::value(),
            &[
                (unit, Variant::from("sec")),
                (secret, Variant::from("x")),
                (class, Variant::Bool(true)),
            ],
        );

        let exporter = JsonSplitExporter::default();
        exporter.process_record(Record::new().with(Entry::immediate(time, 0.25)));
        let doc = parse(&exporter.flush_to_string(&db).unwrap());

        let time_col = doc["columns"]
            .as_array()
            .unwrap()
            .iter()
            .position(|c| c == "time")
            .unwrap();
        assert_eq!(
            doc["column_metadata"][time_col],
            json!({ "is_value": true, "unit": "sec", "class.aggregatable": "true" })
        );
    }

    #[test]
    fn test_reserved_set_is_configurable() {
        let mut db = MemoryMetadata::new();
        let unit = db.create_attribute("unit", AttrType::String, AttrProperties::value());
        let time = db.create_attribute_with_metadata(
            "time",
            AttrType::Double,
            AttrProperties::value(),
            &[(unit, Variant::from("sec"))],
        );
        let attr = db.attribute(time).unwrap().clone();

        let default = JsonSplitExporter::default();
        assert_eq!(
            default.attribute_metadata(&db, &attr),
            vec![("unit".to_string(), "sec".to_string())]
        );

        let strict = JsonSplitExporter::new(
            ColumnClassifier::default(),
            MemoryMetadata::bootstrap_ids().chain([unit]).collect(),
        );
        assert!(strict.attribute_metadata(&db, &attr).is_empty());

        // Hidden bootstrap attributes stay out even with nothing reserved
        let open = JsonSplitExporter::new(ColumnClassifier::default(), ReservedAttributes::none());
        let names: Vec<_> = open
            .attribute_metadata(&db, &attr)
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["unit".to_string()]);
    }

    #[test]
    fn test_globals_merge_and_order() {
        let mut db = MemoryMetadata::new();
        let cluster = db.create_attribute("cluster", AttrType::String, AttrProperties::value().global());
        let build = db.create_attribute("build", AttrType::String, AttrProperties::default().global());
        let leaf = db.make_path(
            NodeId::INVALID,
            &[
                (build, Variant::from("2024")),
                (build, Variant::from("rc1")),
                (build, Variant::from("opt")),
            ],
        );
        db.set_global(Entry::immediate(cluster, "quartz"));
        db.set_global(Entry::reference(leaf));

        assert_eq!(
            merge_globals(&db),
            vec![
                (cluster, "quartz".to_string()),
                (build, "2024/rc1/opt".to_string())
            ]
        );

        let exporter = JsonSplitExporter::default();
        let text = exporter.flush_to_string(&db).unwrap();
        let cluster_pos = text.find("\"cluster\": \"quartz\"").unwrap();
        let build_pos = text.find("\"build\": \"2024/rc1/opt\"").unwrap();
        assert!(cluster_pos < build_pos);
        assert!(text.find("\"nodes\"").unwrap() < cluster_pos);

        // Global attributes never become columns under "all"
        let doc = parse(&text);
        assert_eq!(doc["columns"], json!([]));
    }

    #[test]
    fn test_globals_mixed_ancestry() {
        let mut db = MemoryMetadata::new();
        let a = db.create_attribute("a", AttrType::String, AttrProperties::default().global());
        let b = db.create_attribute("b", AttrType::String, AttrProperties::default().global());
        let leaf = db.make_path(
            NodeId::INVALID,
            &[
                (a, Variant::from("a1")),
                (b, Variant::from("b1")),
                (a, Variant::from("a2")),
            ],
        );
        db.set_global(Entry::reference(leaf));

        // Leaf-to-root walk sees `a` first
        assert_eq!(
            merge_globals(&db),
            vec![(a, "a1/a2".to_string()), (b, "b1".to_string())]
        );
    }

    #[test]
    fn test_global_with_unknown_attribute_is_skipped() {
        let mut db = MemoryMetadata::new();
        db.set_global(Entry::immediate(AttrId(4242), "x"));
        let exporter = JsonSplitExporter::default();
        let stats = exporter.flush(&db, &mut Vec::<u8>::new()).unwrap();
        assert_eq!(stats.globals, 0);
    }

    #[test]
    fn test_flush_stats() {
        let mut f = fixture();
        let exporter = JsonSplitExporter::default();
        exporter.process_record(record(&mut f, 5, &["X", "Y"]));
        exporter.process_record(record(&mut f, 7, &["X", "Z"]));

        let stats = exporter.flush(&f.db, &mut Vec::<u8>::new()).unwrap();
        assert_eq!(
            stats,
            FlushStats {
                rows: 2,
                columns: 2,
                nodes: 3,
                globals: 0
            }
        );
    }

    #[test]
    fn test_alias_in_document() {
        let f = fixture();
        let exporter =
            JsonSplitExporter::new(ColumnClassifier::default().with_alias("B", "Bee"), ReservedAttributes::bootstrap());
        let doc = parse(&exporter.flush_to_string(&f.db).unwrap());
        assert_eq!(doc["columns"], json!(["Bee", "path"]));
    }

    #[test]
    fn test_write_failure_is_reported() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let f = fixture();
        let exporter = JsonSplitExporter::default();
        let err = exporter.flush(&f.db, &mut Broken).unwrap_err();
        assert!(err.to_string().contains("Failed to write data rows"));
    }
}
