use brine_region_schema::{CodecError, SchemaError};
use thiserror::Error;

use crate::source::Diagnostic;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse or bind errors, already rendered against their source.
    #[error("{}", render(.0))]
    Diagnostics(Vec<Diagnostic>),

    #[error("Expected the root value to be a {expected}, found {found}")]
    UnexpectedRoot {
        expected: String,
        found:    String,
    },

    #[error("Invalid identifier {0}")]
    InvalidIdentifier(String),

    #[error("Malformed type reference {type_ref} for field {field}")]
    InvalidTypeRef {
        type_ref: String,
        field:    String,
    },

    #[error("The type {type_ref} is not defined for field {field} of {struct_name}")]
    UnknownType {
        type_ref:    String,
        field:       String,
        struct_name: String,
    },

    #[error("The region {0} is defined twice")]
    DuplicateRegion(String),

    #[error("No region named {0}")]
    UnknownRegion(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

fn render(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.rendered.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
