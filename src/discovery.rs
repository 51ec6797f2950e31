//! Fragment discovery.
//!
//! Walks the plugin directory tree and returns the constraint-language files
//! contributing to each schema.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::SchemaError;

/// File extension of constraint-language fragments.
pub const FRAGMENT_EXT: &str = "cue";

/// Immediate children of the charts folder, sorted by name.
///
/// Sorting pins down the plugin processing order, which first-writer-wins
/// conflict resolution depends on. Non-directory entries are returned as
/// well; the registry skips them with a warning.
pub fn plugin_dirs(charts_root: &Path) -> Result<Vec<PathBuf>, SchemaError> {
    let discovery_err = |source| SchemaError::Discovery {
        path: charts_root.to_path_buf(),
        source,
    };
    let mut entries = Vec::new();
    for entry in fs::read_dir(charts_root).map_err(discovery_err)? {
        entries.push(entry.map_err(discovery_err)?.path());
    }
    entries.sort();
    Ok(entries)
}

/// Recursively enumerate every fragment file under `dir`, in traversal order.
pub fn discover_fragments(dir: &Path) -> Result<Vec<PathBuf>, SchemaError> {
    let mut fragments = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| SchemaError::Discovery {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().map(|e| e == FRAGMENT_EXT).unwrap_or(false)
        {
            fragments.push(path.to_path_buf());
        }
    }
    Ok(fragments)
}
