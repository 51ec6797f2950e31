//! Data model for composed schemas.

use std::path::{Path, PathBuf};

use crate::constraint::{unify, validate, ConstraintError, ValidateOptions, Value};

/// Lookup path of the kind discriminator, in schemas and documents alike.
pub const KIND_PATH: &str = "kind";

/// Ordered set of fragment files compiled into one schema.
///
/// Order is significant: the base definition first, then the plugin's own
/// fragments, then the shared query sub-types, and optionally the generator
/// fragment appended for second-pass compilation.
#[derive(Debug, Clone)]
pub struct FragmentSet {
    origin: PathBuf,
    paths: Vec<PathBuf>,
}

impl FragmentSet {
    /// Assemble the disjunction-free set for a plugin.
    pub fn new(
        origin: &Path,
        base_def: &Path,
        plugin_fragments: Vec<PathBuf>,
        shared: &[PathBuf],
    ) -> Self {
        let mut paths = Vec::with_capacity(1 + plugin_fragments.len() + shared.len());
        paths.push(base_def.to_path_buf());
        paths.extend(plugin_fragments);
        paths.extend(shared.iter().cloned());
        Self {
            origin: origin.to_path_buf(),
            paths,
        }
    }

    /// The same set with the generator fragment appended.
    pub fn with_generator(&self, generator: &Path) -> Self {
        let mut expanded = self.clone();
        expanded.paths.push(generator.to_path_buf());
        expanded
    }

    /// The plugin directory this set was assembled for, used in error context.
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

/// An immutable compiled constraint value for one chart kind.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    root: Value,
}

impl CompiledSchema {
    pub(crate) fn new(root: Value) -> Self {
        Self { root }
    }

    /// The declared kind, when it is a concrete non-empty string.
    pub fn kind(&self) -> Option<&str> {
        self.root
            .lookup(KIND_PATH)
            .and_then(Value::as_str)
            .filter(|kind| !kind.is_empty())
    }

    /// Path-based field lookup into the compiled value.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        self.root.lookup(path)
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Unify `document` with the schema and validate the result.
    pub fn validate_document(
        &self,
        document: &Value,
        opts: ValidateOptions,
    ) -> Result<(), ConstraintError> {
        let unified = unify(document, &self.root)?;
        validate(&unified, opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_set_order() {
        let set = FragmentSet::new(
            Path::new("/s/charts/chart"),
            Path::new("/s/base.cue"),
            vec![PathBuf::from("/s/charts/chart/schema.cue")],
            &[PathBuf::from("/s/queries/q.cue")],
        );
        let paths: Vec<_> = set.paths().iter().map(|p| p.to_str().unwrap()).collect();
        assert_eq!(
            paths,
            vec![
                "/s/base.cue",
                "/s/charts/chart/schema.cue",
                "/s/queries/q.cue"
            ]
        );

        let expanded = set.with_generator(Path::new("/s/generator.cue"));
        assert_eq!(expanded.paths().len(), 4);
        assert_eq!(
            expanded.paths().last().unwrap(),
            &PathBuf::from("/s/generator.cue")
        );
        // The original set is untouched.
        assert_eq!(set.paths().len(), 3);
    }
}
