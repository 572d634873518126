//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use serde_json::Value;

/// Parse an exported document, failing the test on invalid JSON
pub fn parse_document(doc: &str) -> Value {
    serde_json::from_str(doc).unwrap_or_else(|e| panic!("invalid JSON ({}):\n{}", e, doc))
}

/// Column titles of a parsed document
pub fn column_titles(doc: &Value) -> Vec<String> {
    doc["columns"]
        .as_array()
        .expect("columns array")
        .iter()
        .map(|c| c.as_str().expect("column title").to_string())
        .collect()
}

/// Labels from the root down to node `id`, following `parent` links in the
/// document's node table
pub fn node_path(doc: &Value, id: u64) -> Vec<String> {
    let nodes = doc["nodes"].as_array().expect("nodes array");
    let mut labels = Vec::new();
    let mut cur = Some(id);
    while let Some(i) = cur {
        let node = &nodes[i as usize];
        labels.push(node["label"].as_str().expect("node label").to_string());
        cur = node.get("parent").and_then(Value::as_u64);
    }
    labels.reverse();
    labels
}
