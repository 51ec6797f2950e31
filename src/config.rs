//! Schema source configuration.
//!
//! Mirrors the host configuration section that points the registry at its
//! on-disk schema tree. Actually loading configuration (files, environment)
//! is the host's job; this struct is the interface it hands over.
//!
//! Expected layout under `path`:
//! ```text
//! <path>/
//! ├── base.cue         base definition every chart kind must meet
//! ├── generator.cue    synthesizes the query-kind disjunction
//! ├── <charts_folder>/<one directory per plugin>/*.cue
//! └── <queries_folder>/*.cue
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Well-known file at the schema root holding the base definition.
pub const BASE_DEF_FILE: &str = "base.cue";

/// Well-known file at the schema root appended during second-pass
/// compilation to expand the query-kind disjunction.
pub const GENERATOR_FILE: &str = "generator.cue";

/// Configuration for the schema registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemasConfig {
    /// Root of the schema tree.
    pub path: PathBuf,

    /// Sub-folder holding one directory per chart plugin.
    #[serde(default = "default_charts_folder")]
    pub charts_folder: String,

    /// Sub-folder holding the query sub-type fragments shared by every plugin.
    #[serde(default = "default_queries_folder")]
    pub queries_folder: String,
}

fn default_charts_folder() -> String {
    "charts".to_string()
}

fn default_queries_folder() -> String {
    "queries".to_string()
}

impl SchemasConfig {
    /// Configuration with the default sub-folder names.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            charts_folder: default_charts_folder(),
            queries_folder: default_queries_folder(),
        }
    }

    pub fn charts_root(&self) -> PathBuf {
        self.path.join(&self.charts_folder)
    }

    pub fn queries_root(&self) -> PathBuf {
        self.path.join(&self.queries_folder)
    }

    pub fn base_def_file(&self) -> PathBuf {
        self.path.join(BASE_DEF_FILE)
    }

    pub fn generator_file(&self) -> PathBuf {
        self.path.join(GENERATOR_FILE)
    }

    pub fn root(&self) -> &Path {
        &self.path
    }
}
