//! # jsonsplit: split-JSON measurement export
//!
//! Converts per-measurement attribute/value records into a deduplicated
//! hierarchical table and writes it as a single JSON document that analysis
//! tools consume.
//!
//! ## Architecture
//!
//! - **Metadata**: read-only access to attributes, the ancestry graph and
//!   process-wide globals ([`MetadataSource`])
//! - **Buffer**: thread-safe FIFO of records awaiting export
//! - **Classifier**: turns the current attribute set into output columns
//! - **Interner**: deduplicates region paths into a shared tree with stable ids
//! - **Exporter**: walks buffered records and writes the document
//!
//! Producers call [`JsonSplitExporter::process_record`] from any thread while
//! measuring. Once they are done, a single consumer calls
//! [`JsonSplitExporter::flush`].
//!
//! ## Example
//!
//! ```ignore
//! use jsonsplit::{
//!     AttrProperties, AttrType, Entry, FormatterConfig, JsonSplitExporter, MemoryMetadata,
//!     NodeId, Record, Variant,
//! };
//!
//! let mut db = MemoryMetadata::new();
//! let iterations = db.create_attribute("iterations", AttrType::Int, AttrProperties::value());
//! let function = db.create_attribute("function", AttrType::String, AttrProperties::nested());
//! let main = db.make_node(function, Variant::from("main"), NodeId::INVALID);
//!
//! let exporter = JsonSplitExporter::from_config(&FormatterConfig::default())?;
//! exporter.process_record(
//!     Record::new()
//!         .with(Entry::immediate(iterations, 5i64))
//!         .with(Entry::reference(main)),
//! );
//!
//! exporter.flush(&db, &mut std::io::stdout())?;
//! ```

pub mod buffer;
pub mod classifier;
pub mod config;
pub mod error;
pub mod exporter;
pub mod id;
pub mod interner;
pub mod metadata;
pub mod types;

// Re-export commonly used types
pub use buffer::RecordBuffer;
pub use classifier::{AttributeSelection, Column, ColumnClassifier, PATH_COLUMN};
pub use config::{FormatterConfig, ReservedAttributes, Selection};
pub use error::{ExportError, Result};
pub use exporter::{FlushStats, JsonSplitExporter};
pub use id::{AttrId, NodeId, PathId};
pub use interner::{PathInterner, PathNodeRecord};
pub use metadata::{Capture, MemoryMetadata, MetadataSource};
pub use types::{AttrProperties, AttrType, Attribute, Entry, Node, Record, Variant};
