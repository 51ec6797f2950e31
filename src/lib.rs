//! Dashboard Schema Registry
//!
//! A constraint-schema registry and structural validation engine for
//! dashboard panels. Per-plugin schema fragments are discovered from a
//! directory tree, composed into one constraint document per chart kind, and
//! incoming JSON panels are validated against the schema matching their
//! declared kind by unification.
//!
//! ## Schema tree
//!
//! ```text
//! <schemas root>/
//! ├── base.cue              base definition every chart kind must meet
//! ├── generator.cue         synthesizes the query-kind disjunction
//! ├── charts/
//! │   ├── awesomechart/     one directory per plugin; *.cue files are
//! │   │   └── schema.cue    discovered recursively
//! │   └── averagechart/
//! │       └── schema.cue
//! └── queries/              query sub-types shared by every plugin
//!     ├── custom_graph.cue
//!     └── sql_graph.cue
//! ```
//!
//! On reload, each plugin compiles as `[base.cue] + <plugin fragments> +
//! <queries/*.cue>` to probe its `kind`, then once more with `generator.cue`
//! appended to expand the query disjunctions, and the result is registered
//! under the kind. Validation unifies each panel with the registered schema
//! for its kind and requires the unified result to be fully concrete.
//!
//! ```no_run
//! use std::sync::Arc;
//! use dashboard_schemas::{PanelValidator, SchemaRegistry, SchemasConfig};
//!
//! let registry = Arc::new(SchemaRegistry::new(SchemasConfig::new("/etc/schemas")));
//! registry.reload();
//!
//! let validator = PanelValidator::new(registry);
//! let mut panels = std::collections::HashMap::new();
//! panels.insert(
//!     "MyPanel".to_string(),
//!     br#"{"kind": "AwesomeChart", "display": {"name": "x"}, "options": {}}"#.to_vec(),
//! );
//! validator.validate(&panels)?;
//! # Ok::<(), dashboard_schemas::SchemaError>(())
//! ```

pub mod compiler;
pub mod config;
pub mod constraint;
pub mod discovery;
pub mod error;
pub mod registry;
pub mod schema;
pub mod validator;

pub use compiler::compile;
pub use config::{SchemasConfig, BASE_DEF_FILE, GENERATOR_FILE};
pub use constraint::{ConstraintError, ValidateOptions, Value};
pub use error::{Result, SchemaError};
pub use registry::SchemaRegistry;
pub use schema::{CompiledSchema, FragmentSet};
pub use validator::PanelValidator;
