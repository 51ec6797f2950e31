//! Validation engine
//!
//! Checks batches of panel documents against the schemas registered for
//! their declared kinds.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::constraint::{ConstraintError, ValidateOptions, Value};
use crate::error::SchemaError;
use crate::registry::SchemaRegistry;
use crate::schema::KIND_PATH;

/// Validates panels against the known list of schemas.
pub struct PanelValidator {
    registry: Arc<SchemaRegistry>,
}

impl PanelValidator {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    /// Verify a batch of panels, keyed by panel name.
    ///
    /// Fail-fast: processing stops at the first invalid panel (in map
    /// iteration order) and that failure is the sole reported outcome.
    /// Unification requires the result to be fully concrete, with
    /// attributes, definitions, and hidden fields included.
    pub fn validate(&self, panels: &HashMap<String, Vec<u8>>) -> Result<(), SchemaError> {
        for (name, raw) in panels {
            trace!(panel = %name, "panel to validate");

            let document =
                Value::from_json_bytes(raw).map_err(|source| {
                    let err = SchemaError::InvalidPanel {
                        name: name.clone(),
                        source,
                    };
                    warn!(%err, "panel rejected");
                    err
                })?;

            // An empty kind string falls through to the registry lookup and
            // is rejected there as unknown.
            let kind = match document.lookup(KIND_PATH).and_then(Value::as_str) {
                Some(kind) => kind.to_owned(),
                None => {
                    let err = SchemaError::InvalidPanel {
                        name: name.clone(),
                        source: ConstraintError::Incomplete {
                            path: KIND_PATH.to_string(),
                            hint: "string".to_string(),
                        },
                    };
                    warn!(%err, "panel rejected");
                    return Err(err);
                }
            };

            let Some(schema) = self.registry.lookup(&kind) else {
                let err = SchemaError::UnknownKind {
                    name: name.clone(),
                    kind,
                };
                debug!(%err, "panel rejected");
                return Err(err);
            };

            schema
                .validate_document(&document, ValidateOptions::strict())
                .map_err(|source| {
                    let err = SchemaError::SchemaViolation {
                        name: name.clone(),
                        kind: kind.clone(),
                        source,
                    };
                    debug!(%err, "panel rejected");
                    err
                })?;
        }

        debug!("all panels are valid");
        Ok(())
    }
}
