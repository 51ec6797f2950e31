//! Error types for the schema registry and validator.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::constraint::ConstraintError;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema registry and validation errors.
///
/// Reload-side variants (`Discovery` through `GeneratorCompile`) are
/// absorbed by the registry: the affected plugin is logged and skipped, the
/// pass continues. Validate-side variants (`InvalidPanel`, `UnknownKind`,
/// `SchemaViolation`) abort the batch and are returned to the caller.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("not able to read schema files from {}: {source}", .path.display())]
    Discovery { path: PathBuf, source: io::Error },

    #[error("not able to read fragment {}: {source}", .path.display())]
    FragmentRead { path: PathBuf, source: io::Error },

    #[error("error compiling schema for {}: {source}", .path.display())]
    Compile {
        path: PathBuf,
        source: ConstraintError,
    },

    #[error("the number of build units for {} is {count}, expected exactly 1", .path.display())]
    AmbiguousUnit { path: PathBuf, count: usize },

    #[error("schema at {} does not declare a concrete kind", .path.display())]
    MissingKind { path: PathBuf },

    #[error("conflict caused by {}: a schema already exists for kind {kind}", .path.display())]
    DuplicateKind { path: PathBuf, kind: String },

    #[error("generator expansion failed for {}: {source}", .path.display())]
    GeneratorCompile {
        path: PathBuf,
        source: Box<SchemaError>,
    },

    #[error("invalid panel {name}: {source}")]
    InvalidPanel {
        name: String,
        source: ConstraintError,
    },

    #[error("invalid panel {name}: unknown kind {kind}")]
    UnknownKind { name: String, kind: String },

    #[error("invalid panel {name}: {kind} schema conditions not met: {source}")]
    SchemaViolation {
        name: String,
        kind: String,
        source: ConstraintError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
