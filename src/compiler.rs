//! Schema compiler: fragment set in, compiled constraint value out.
//!
//! All fragments of a set are loaded as one logical build unit, merged by
//! unification, and resolved into a single value. The set must yield exactly
//! one build unit: files sharing a `package` clause merge into one unit,
//! every file without a clause is an anonymous unit of its own.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::mem;
use std::path::Path;

use crate::constraint::{parse_fragment, unify, ConstraintError, SourceFile, StructVal, Value};
use crate::error::SchemaError;
use crate::schema::{CompiledSchema, FragmentSet};

/// Compile an ordered fragment set into a single schema value.
///
/// No partial value is ever returned: read, parse, merge, and reference
/// resolution failures all abort the compilation with the originating path.
pub fn compile(set: &FragmentSet) -> Result<CompiledSchema, SchemaError> {
    let files = load_fragments(set)?;
    check_single_unit(set.origin(), &files)?;

    let mut root = Value::Struct(StructVal::open());
    for (path, file) in files {
        root = unify(&root, &Value::Struct(file.root)).map_err(|source| SchemaError::Compile {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let root = resolve_references(root).map_err(|source| SchemaError::Compile {
        path: set.origin().to_path_buf(),
        source,
    })?;
    Ok(CompiledSchema::new(root))
}

fn load_fragments<'s>(
    set: &'s FragmentSet,
) -> Result<Vec<(&'s Path, SourceFile)>, SchemaError> {
    let mut files = Vec::with_capacity(set.paths().len());
    for path in set.paths() {
        let src = fs::read_to_string(path).map_err(|source| SchemaError::FragmentRead {
            path: path.to_path_buf(),
            source,
        })?;
        let file = parse_fragment(&src).map_err(|source| SchemaError::Compile {
            path: path.to_path_buf(),
            source,
        })?;
        files.push((path.as_path(), file));
    }
    Ok(files)
}

fn check_single_unit(origin: &Path, files: &[(&Path, SourceFile)]) -> Result<(), SchemaError> {
    let mut packages: BTreeSet<&str> = BTreeSet::new();
    let mut anonymous = 0usize;
    for (_, file) in files {
        match &file.package {
            Some(name) => {
                packages.insert(name);
            }
            None => anonymous += 1,
        }
    }
    let units = packages.len() + anonymous;
    if units != 1 {
        return Err(SchemaError::AmbiguousUnit {
            path: origin.to_path_buf(),
            count: units,
        });
    }
    Ok(())
}

/// Expand every `#Name` reference against the top-level definitions of the
/// merged root. Undefined and cyclic references are build errors.
fn resolve_references(root: Value) -> Result<Value, ConstraintError> {
    let definitions: BTreeMap<String, Value> = match &root {
        Value::Struct(s) => s
            .fields
            .iter()
            .filter(|(_, field)| field.definition)
            .map(|(name, field)| (name.clone(), field.value.clone()))
            .collect(),
        _ => BTreeMap::new(),
    };
    let mut resolver = Resolver {
        definitions,
        resolved: HashMap::new(),
        in_progress: HashSet::new(),
    };
    resolver.resolve(root)
}

struct Resolver {
    definitions: BTreeMap<String, Value>,
    resolved: HashMap<String, Value>,
    in_progress: HashSet<String>,
}

impl Resolver {
    fn resolve(&mut self, value: Value) -> Result<Value, ConstraintError> {
        match value {
            Value::Reference(name) => self.resolve_reference(&name),
            Value::Struct(mut s) => {
                for field in s.fields.values_mut() {
                    let inner = mem::replace(&mut field.value, Value::Null);
                    field.value = self.resolve(inner)?;
                }
                Ok(Value::Struct(s))
            }
            Value::List(mut l) => {
                l.elems = l
                    .elems
                    .into_iter()
                    .map(|elem| self.resolve(elem))
                    .collect::<Result<_, _>>()?;
                l.rest = match l.rest {
                    Some(rest) => Some(Box::new(self.resolve(*rest)?)),
                    None => None,
                };
                Ok(Value::List(l))
            }
            Value::Disjunction(alternatives) => Ok(Value::Disjunction(
                alternatives
                    .into_iter()
                    .map(|alt| self.resolve(alt))
                    .collect::<Result<_, _>>()?,
            )),
            other => Ok(other),
        }
    }

    fn resolve_reference(&mut self, name: &str) -> Result<Value, ConstraintError> {
        if let Some(value) = self.resolved.get(name) {
            return Ok(value.clone());
        }
        let body = self
            .definitions
            .get(name)
            .cloned()
            .ok_or_else(|| ConstraintError::UndefinedReference {
                name: name.to_string(),
            })?;
        if !self.in_progress.insert(name.to_string()) {
            return Err(ConstraintError::CyclicReference {
                name: name.to_string(),
            });
        }
        let resolved = self.resolve(body)?;
        self.in_progress.remove(name);
        self.resolved.insert(name.to_string(), resolved.clone());
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn set_of(origin: &Path, paths: Vec<PathBuf>) -> FragmentSet {
        let (base, rest) = paths.split_first().unwrap();
        FragmentSet::new(origin, base, rest.to_vec(), &[])
    }

    #[test]
    fn test_compile_merges_fragments() {
        let dir = tempfile::tempdir().unwrap();
        let base = write(dir.path(), "base.cue", "package panel\n\nkind: string\noptions: _\n");
        let plugin = write(
            dir.path(),
            "schema.cue",
            "package panel\n\nkind: \"AwesomeChart\"\n",
        );
        let schema = compile(&set_of(dir.path(), vec![base, plugin])).unwrap();
        assert_eq!(schema.kind(), Some("AwesomeChart"));
        assert_eq!(schema.lookup("options"), Some(&Value::Top));
    }

    #[test]
    fn test_compile_resolves_references() {
        let dir = tempfile::tempdir().unwrap();
        let defs = write(
            dir.path(),
            "defs.cue",
            "package panel\n\n#Query: {kind: \"Q\"}\n",
        );
        let main = write(dir.path(), "main.cue", "package panel\n\nquery: #Query\n");
        let schema = compile(&set_of(dir.path(), vec![defs, main])).unwrap();
        assert_eq!(
            schema.lookup("query.kind"),
            Some(&Value::String("Q".to_string()))
        );
    }

    #[test]
    fn test_compile_merges_repeated_reference() {
        let dir = tempfile::tempdir().unwrap();
        let defs = write(
            dir.path(),
            "defs.cue",
            "package panel\n\n#Query: {kind: \"Q\"}\n",
        );
        let a = write(dir.path(), "a.cue", "package panel\n\nquery: #Query\n");
        let b = write(dir.path(), "b.cue", "package panel\n\nquery: #Query\n");
        let schema = compile(&set_of(dir.path(), vec![defs, a, b])).unwrap();
        assert_eq!(
            schema.lookup("query.kind"),
            Some(&Value::String("Q".to_string()))
        );
    }

    #[test]
    fn test_compile_rejects_two_packages() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.cue", "package panel\n\nkind: string\n");
        let b = write(dir.path(), "b.cue", "package other\n\nname: string\n");
        let err = compile(&set_of(dir.path(), vec![a, b])).unwrap_err();
        assert!(matches!(err, SchemaError::AmbiguousUnit { count: 2, .. }));
    }

    #[test]
    fn test_compile_rejects_anonymous_extra_unit() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.cue", "package panel\n\nkind: string\n");
        let b = write(dir.path(), "b.cue", "name: string\n");
        let err = compile(&set_of(dir.path(), vec![a, b])).unwrap_err();
        assert!(matches!(err, SchemaError::AmbiguousUnit { count: 2, .. }));
    }

    #[test]
    fn test_compile_undefined_reference() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.cue", "package panel\n\nquery: #Missing\n");
        let err = compile(&set_of(dir.path(), vec![a])).unwrap_err();
        let SchemaError::Compile { source, .. } = err else {
            panic!("expected compile error, got {err}");
        };
        assert!(matches!(
            source,
            ConstraintError::UndefinedReference { .. }
        ));
    }

    #[test]
    fn test_compile_cyclic_reference() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(
            dir.path(),
            "a.cue",
            "package panel\n\n#A: {next: #B}\n#B: {next: #A}\nroot: #A\n",
        );
        let err = compile(&set_of(dir.path(), vec![a])).unwrap_err();
        let SchemaError::Compile { source, .. } = err else {
            panic!("expected compile error, got {err}");
        };
        assert!(matches!(source, ConstraintError::CyclicReference { .. }));
    }

    #[test]
    fn test_compile_conflicting_fragments() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.cue", "package panel\n\nkind: \"A\"\n");
        let b = write(dir.path(), "b.cue", "package panel\n\nkind: \"B\"\n");
        let err = compile(&set_of(dir.path(), vec![a, b])).unwrap_err();
        assert!(matches!(err, SchemaError::Compile { .. }));
    }

    #[test]
    fn test_compile_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = compile(&set_of(dir.path(), vec![dir.path().join("nope.cue")])).unwrap_err();
        assert!(matches!(err, SchemaError::FragmentRead { .. }));
    }
}
