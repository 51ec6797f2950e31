//! Schema Registry
//!
//! Concurrent keyed store of compiled schemas, one per chart kind. Reload
//! re-derives the whole mapping from the on-disk plugin tree; lookups are
//! pure reads that can run concurrently with a reload.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, error, info, warn};

use crate::compiler::compile;
use crate::config::SchemasConfig;
use crate::discovery::{discover_fragments, plugin_dirs};
use crate::error::SchemaError;
use crate::schema::{CompiledSchema, FragmentSet};

/// The registry of compiled schemas, keyed by kind.
///
/// Constructed once and handed by reference to whoever needs lookups; the
/// reload path is the only writer.
pub struct SchemaRegistry {
    config: SchemasConfig,
    schemas: RwLock<HashMap<String, Arc<CompiledSchema>>>,
}

impl SchemaRegistry {
    /// Create an empty registry. Call [`SchemaRegistry::reload`] to populate it.
    pub fn new(config: SchemasConfig) -> Self {
        Self {
            config,
            schemas: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SchemasConfig {
        &self.config
    }

    /// Look up the compiled schema registered for `kind`.
    pub fn lookup(&self, kind: &str) -> Option<Arc<CompiledSchema>> {
        self.schemas
            .read()
            .expect("schema registry lock poisoned")
            .get(kind)
            .cloned()
    }

    /// Sorted list of registered kinds.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self
            .schemas
            .read()
            .expect("schema registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.schemas
            .read()
            .expect("schema registry lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (Re)load the known list of schemas from the plugin tree.
    ///
    /// Per-plugin failures never surface to the caller: the plugin is logged
    /// and skipped, leaving its kind unregistered for this pass. Only an
    /// unreadable schema root (charts folder, shared query folder, or base
    /// definition) aborts the pass, keeping the previous registry content
    /// intact.
    ///
    /// The new mapping is built privately and published with a single swap,
    /// so concurrent lookups observe either the old or the new registry,
    /// never an in-between state.
    pub fn reload(&self) {
        let base_def = self.config.base_def_file();
        if !base_def.is_file() {
            error!(
                path = %base_def.display(),
                "base definition file is missing, aborting schema reload"
            );
            return;
        }

        let queries_root = self.config.queries_root();
        let shared = match discover_fragments(&queries_root) {
            Ok(fragments) => fragments,
            Err(err) => {
                error!(%err, path = %queries_root.display(), "not able to read shared query fragments, aborting schema reload");
                return;
            }
        };

        let charts_root = self.config.charts_root();
        let plugins = match plugin_dirs(&charts_root) {
            Ok(dirs) => dirs,
            Err(err) => {
                error!(%err, path = %charts_root.display(), "not able to read from charts dir, aborting schema reload");
                return;
            }
        };

        let generator = self.config.generator_file();
        let generator = if generator.is_file() {
            Some(generator)
        } else {
            warn!(
                path = %generator.display(),
                "generator fragment is missing, schemas are compiled without query disjunctions"
            );
            None
        };

        let mut next: HashMap<String, Arc<CompiledSchema>> = HashMap::new();
        for plugin in plugins {
            if !plugin.is_dir() {
                warn!(path = %plugin.display(), "chart plugin is not a folder");
                continue;
            }
            match load_plugin(&plugin, &base_def, &shared, generator.as_deref(), &next) {
                Ok((kind, schema)) => {
                    debug!(kind = %kind, path = %plugin.display(), "loaded schema");
                    next.insert(kind, Arc::new(schema));
                }
                Err(err) => error!(%err, "skipping this chart"),
            }
        }

        *self.schemas.write().expect("schema registry lock poisoned") = next;
        info!("schemas list (re)loaded");
    }
}

/// Two-pass compilation for one plugin directory.
///
/// The first pass compiles without the generator: a cheap, disjunction-free
/// probe that the kind is extractable and unclaimed. The second pass appends
/// the generator and compiles the schema actually registered. A second-pass
/// failure leaves the kind unregistered for this reload even when a previous
/// reload had it (fail closed).
fn load_plugin(
    plugin: &Path,
    base_def: &Path,
    shared: &[PathBuf],
    generator: Option<&Path>,
    registered: &HashMap<String, Arc<CompiledSchema>>,
) -> Result<(String, CompiledSchema), SchemaError> {
    let fragments = discover_fragments(plugin)?;
    let set = FragmentSet::new(plugin, base_def, fragments, shared);

    let probe = compile(&set)?;
    let kind = probe
        .kind()
        .map(str::to_owned)
        .ok_or_else(|| SchemaError::MissingKind {
            path: plugin.to_path_buf(),
        })?;
    if registered.contains_key(&kind) {
        return Err(SchemaError::DuplicateKind {
            path: plugin.to_path_buf(),
            kind,
        });
    }

    let schema = match generator {
        Some(generator) => compile(&set.with_generator(generator)).map_err(|err| {
            SchemaError::GeneratorCompile {
                path: plugin.to_path_buf(),
                source: Box::new(err),
            }
        })?,
        None => probe,
    };
    Ok((kind, schema))
}
