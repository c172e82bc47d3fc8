//! Protograph - rule-driven graph loading
//!
//! Converts newline-delimited JSON records into graph mutation statements
//! (vertex creation, property assignment, edge creation) according to a YAML
//! ruleset keyed by record label.
//!
//! # Architecture
//!
//! ```text
//! input.jsonl ─► RecordStream ─► bounded channel ─► Pipeline ─► Transformer ─► Sink
//!                (reader task)                      (consumer)   (per record)   (stdout / HTTP)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use protograph::{Pipeline, RecordStream, Schema, sink::JsonLinesSink};
//!
//! let schema = Schema::load("schema.yml")?;
//! let stream = RecordStream::open("data.jsonl", protograph::DEFAULT_BUFFER_CAPACITY).await?;
//! let mut sink = JsonLinesSink::new(tokio::io::stdout());
//! let stats = Pipeline::new(&schema).run(stream, &mut sink).await?;
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod mutation;
pub mod pipeline;
pub mod schema;
pub mod sink;
pub mod template;
pub mod transform;
pub mod value;

pub use error::{FieldSkipped, IngestError, RecordRejected, SchemaError, SinkError};
pub use ingest::{IngestStats, RecordStream};
pub use mutation::{MutationGroup, MutationStatement};
pub use pipeline::{Pipeline, PipelineStats};
pub use schema::{ActionKind, FieldAction, Schema, SchemaWarning, TransformRule};
pub use sink::Sink;
pub use transform::{Conversion, Transformer};
pub use value::{Value, Wrap, wrap};

/// One decoded input record, fields in input order
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Reserved record field naming the rule to apply
pub const LABEL_KEY: &str = "#label";

/// Records buffered between the reader and the converter
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// Read buffer size for input files (100KB)
pub const READ_BUFFER_SIZE: usize = 100 * 1024;
