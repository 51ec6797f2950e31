//! Constraint-language evaluator
//!
//! A compact evaluator for the constraint language schema fragments are
//! written in. It supplies the primitives the registry and validator
//! orchestrate: parse bytes into a value, merge fragment files into a single
//! value, path-based lookup, unification of two values, and concreteness
//! validation with toggleable inclusion of hidden fields and definitions.
//!
//! The language is a structural subset of the usual configuration-constraint
//! family: concrete scalars, type atoms (`string`, `number`, `int`, `float`,
//! `bool`), the top value `_`, closed-by-default struct literals (opened with
//! `...`), list literals with `...elem` tails, `#Name` definitions and
//! references, `_name` hidden fields, `a | b` disjunctions, and `@attr(...)`
//! field attributes.

mod parser;
mod unify;
mod value;

pub use parser::{parse_fragment, SourceFile};
pub use unify::{unify, validate, ValidateOptions};
pub use value::{Attribute, Field, ListVal, StructVal, TypeKind, Value};

use thiserror::Error;

/// Errors raised by the constraint evaluator.
///
/// Paths in messages are dotted field paths from the root of the evaluated
/// value, with list elements addressed by index.
#[derive(Error, Debug)]
pub enum ConstraintError {
    #[error("syntax error at {line}:{column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// An input document could not be parsed at all.
    #[error("{0}")]
    Document(String),

    #[error("{}conflicting values {left} and {right}", at(.path))]
    Conflict {
        path: String,
        left: String,
        right: String,
    },

    #[error("{}field not allowed: {field}", at(.path))]
    FieldNotAllowed { path: String, field: String },

    #[error("{}incomplete value ({hint})", at(.path))]
    Incomplete { path: String, hint: String },

    /// No alternative of a disjunction unified with the value.
    #[error("{}{failed} errors in empty disjunction", at(.path))]
    EmptyDisjunction { path: String, failed: usize },

    /// More than one alternative unified; the disjunction requires exactly one.
    #[error("{}value matches {matched} disjunction alternatives, expected exactly one", at(.path))]
    AmbiguousDisjunction { path: String, matched: usize },

    #[error("undefined reference {name}")]
    UndefinedReference { name: String },

    #[error("cyclic reference through {name}")]
    CyclicReference { name: String },
}

fn at(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("{path}: ")
    }
}
