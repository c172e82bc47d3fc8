//! Error and diagnostic types
//!
//! Only [`SchemaError`] is fatal. Everything raised while converting records is
//! absorbed by the caller and surfaced as a diagnostic.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a ruleset
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read schema {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed schema document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Schema document must be a list of rules, found {found}")]
    NotAList { found: String },

    #[error("Unsupported value at {path}: {reason}")]
    Unsupported { path: String, reason: String },

    #[error("Invalid rule #{index}: {message}")]
    InvalidRule { index: usize, message: String },

    #[error("Invalid id template for label '{label}': {message}")]
    InvalidTemplate { label: String, message: String },
}

/// Why a whole record produced no mutation groups
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordRejected {
    #[error("Record has no label and no label override was given")]
    MissingLabel,

    #[error("Record label is not a string")]
    InvalidLabel,

    #[error("No rule found for label '{0}'")]
    UnknownLabel(String),
}

/// Why a single field contributed nothing to the output
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldSkipped {
    #[error("Field '{field}' has an unsupported value shape")]
    Unsupported { field: String },

    #[error("Field '{field}' has the wrong shape for {action}: {detail}")]
    WrongShape {
        field: String,
        action: &'static str,
        detail: String,
    },

    #[error("Field '{field}' uses unimplemented action {action}")]
    Unimplemented { field: String, action: &'static str },
}

impl FieldSkipped {
    /// Name of the field that was skipped
    pub fn field(&self) -> &str {
        match self {
            FieldSkipped::Unsupported { field }
            | FieldSkipped::WrongShape { field, .. }
            | FieldSkipped::Unimplemented { field, .. } => field,
        }
    }
}

/// Errors reported by a mutation sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Mutation service returned {status}: {message}")]
    Status { status: u16, message: String },
}

/// Errors raised by the line reader
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to open input {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Read error after {lines} lines: {source}")]
    Read {
        lines: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("Reader task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_skipped_names_field() {
        let skip = FieldSkipped::Unimplemented {
            field: "parent".to_string(),
            action: "single_edge",
        };
        assert_eq!(skip.field(), "parent");

        let msg = skip.to_string();
        assert!(msg.contains("parent"));
        assert!(msg.contains("single_edge"));
    }

    #[test]
    fn test_unknown_label_message() {
        let err = RecordRejected::UnknownLabel("Gene".to_string());
        assert!(err.to_string().contains("Gene"));
    }
}
