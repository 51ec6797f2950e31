//! Unification and concreteness validation.

use std::collections::BTreeMap;

use super::value::{Field, ListVal, StructVal, TypeKind, Value};
use super::ConstraintError;

/// Options controlling [`validate`], mirroring the evaluator toggles the
/// validation engine passes through: require full concreteness, and include
/// attribute-bearing, definition, and hidden fields in the walk.
///
/// `attributes` is kept for API parity with the other toggles: attribute
/// annotations carry no checkable constraints in this language subset, so
/// the flag does not change the walk.
#[derive(Debug, Clone, Copy)]
pub struct ValidateOptions {
    pub concrete: bool,
    pub attributes: bool,
    pub definitions: bool,
    pub hidden: bool,
}

impl ValidateOptions {
    /// Everything on. This is what panel validation uses.
    pub fn strict() -> Self {
        Self {
            concrete: true,
            attributes: true,
            definitions: true,
            hidden: true,
        }
    }
}

/// Structurally merge two values.
///
/// Fails if the values are incompatible: conflicting scalars, a concrete
/// value outside a type atom, mismatched shapes, a field added to a closed
/// struct, or a disjunction where not exactly one alternative unifies.
pub fn unify(a: &Value, b: &Value) -> Result<Value, ConstraintError> {
    let mut path = Vec::new();
    unify_at(a, b, &mut path)
}

fn join(path: &[String]) -> String {
    path.join(".")
}

fn conflict(path: &[String], a: &Value, b: &Value) -> ConstraintError {
    ConstraintError::Conflict {
        path: join(path),
        left: a.describe(),
        right: b.describe(),
    }
}

fn unify_at(a: &Value, b: &Value, path: &mut Vec<String>) -> Result<Value, ConstraintError> {
    use Value::*;
    match (a, b) {
        (Top, other) | (other, Top) => Ok(other.clone()),
        // Identical references are the same constraint, so fragments can
        // bind one field to the same definition before resolution.
        (Reference(x), Reference(y)) if x == y => Ok(Reference(x.clone())),
        (Reference(name), _) | (_, Reference(name)) => Err(ConstraintError::UndefinedReference {
            name: name.clone(),
        }),
        (Disjunction(alts), other) | (other, Disjunction(alts)) => {
            unify_disjunction(alts, other, path)
        }
        (Type(x), Type(y)) => match type_meet(*x, *y) {
            Some(t) => Ok(Type(t)),
            None => Err(conflict(path, a, b)),
        },
        (Type(t), v) | (v, Type(t)) if t.admits(v) => Ok(v.clone()),
        (Struct(x), Struct(y)) => unify_structs(x, y, path),
        (List(x), List(y)) => unify_lists(x, y, path),
        (Null, Null) => Ok(Null),
        (Bool(x), Bool(y)) if x == y => Ok(Bool(*x)),
        (Int(x), Int(y)) if x == y => Ok(Int(*x)),
        (String(x), String(y)) if x == y => Ok(String(x.clone())),
        (Float(x), Float(y)) if x == y => Ok(Float(*x)),
        // Int and float are disjoint: 1 and 1.0 do not unify.
        _ => Err(conflict(path, a, b)),
    }
}

/// The meet of two type atoms, `None` when disjoint.
fn type_meet(x: TypeKind, y: TypeKind) -> Option<TypeKind> {
    match (x, y) {
        _ if x == y => Some(x),
        (TypeKind::Number, TypeKind::Int) | (TypeKind::Int, TypeKind::Number) => Some(TypeKind::Int),
        (TypeKind::Number, TypeKind::Float) | (TypeKind::Float, TypeKind::Number) => {
            Some(TypeKind::Float)
        }
        _ => None,
    }
}

/// Exactly-one semantics: the value must unify with precisely one
/// alternative of the disjunction.
fn unify_disjunction(
    alternatives: &[Value],
    other: &Value,
    path: &mut Vec<String>,
) -> Result<Value, ConstraintError> {
    let depth = path.len();
    let mut matched = Vec::new();
    let mut failed = 0usize;
    for alternative in alternatives {
        match unify_at(alternative, other, path) {
            Ok(value) => matched.push(value),
            Err(_) => failed += 1,
        }
        // A failed branch may have left partial segments behind.
        path.truncate(depth);
    }
    match matched.len() {
        1 => Ok(matched.remove(0)),
        0 => Err(ConstraintError::EmptyDisjunction {
            path: join(path),
            failed,
        }),
        n => Err(ConstraintError::AmbiguousDisjunction {
            path: join(path),
            matched: n,
        }),
    }
}

fn unify_structs(
    x: &StructVal,
    y: &StructVal,
    path: &mut Vec<String>,
) -> Result<Value, ConstraintError> {
    let mut fields: BTreeMap<String, Field> = BTreeMap::new();

    for (name, fx) in &x.fields {
        let merged = match y.fields.get(name) {
            Some(fy) => {
                path.push(name.clone());
                let value = unify_at(&fx.value, &fy.value, path)?;
                path.pop();
                let mut attributes = fx.attributes.clone();
                attributes.extend(fy.attributes.iter().cloned());
                Field {
                    value,
                    optional: fx.optional && fy.optional,
                    hidden: fx.hidden,
                    definition: fx.definition,
                    attributes,
                }
            }
            None => {
                if !y.open && fx.is_regular() {
                    return Err(ConstraintError::FieldNotAllowed {
                        path: join(path),
                        field: name.clone(),
                    });
                }
                fx.clone()
            }
        };
        fields.insert(name.clone(), merged);
    }

    for (name, fy) in &y.fields {
        if x.fields.contains_key(name) {
            continue;
        }
        if !x.open && fy.is_regular() {
            return Err(ConstraintError::FieldNotAllowed {
                path: join(path),
                field: name.clone(),
            });
        }
        fields.insert(name.clone(), fy.clone());
    }

    Ok(Value::Struct(StructVal {
        fields,
        open: x.open && y.open,
    }))
}

fn unify_lists(x: &ListVal, y: &ListVal, path: &mut Vec<String>) -> Result<Value, ConstraintError> {
    fn elem_at<'v>(list: &'v ListVal, index: usize) -> Option<&'v Value> {
        list.elems.get(index).or(list.rest.as_deref())
    }

    let prefix_len = x.elems.len().max(y.elems.len());
    let mut elems = Vec::with_capacity(prefix_len);
    for index in 0..prefix_len {
        let (Some(ax), Some(by)) = (elem_at(x, index), elem_at(y, index)) else {
            return Err(ConstraintError::Conflict {
                path: join(path),
                left: format!("list({} elements)", x.elems.len()),
                right: format!("list({} elements)", y.elems.len()),
            });
        };
        path.push(index.to_string());
        elems.push(unify_at(ax, by, path)?);
        path.pop();
    }
    let rest = match (&x.rest, &y.rest) {
        (Some(rx), Some(ry)) => Some(Box::new(unify_at(rx, ry, path)?)),
        // One side is fixed-length, so the result is too.
        _ => None,
    };
    Ok(Value::List(ListVal { elems, rest }))
}

/// Check a (typically unified) value against the given options.
///
/// With `concrete` set, every reachable required data field must be a fully
/// resolved literal. Optional fields impose nothing. Definition and hidden
/// fields are walked only when enabled, and are never themselves required to
/// be concrete: they are schema machinery, not data.
pub fn validate(value: &Value, opts: ValidateOptions) -> Result<(), ConstraintError> {
    let mut path = Vec::new();
    check(value, opts, opts.concrete, &mut path)
}

fn check(
    value: &Value,
    opts: ValidateOptions,
    require_concrete: bool,
    path: &mut Vec<String>,
) -> Result<(), ConstraintError> {
    let incomplete = |path: &[String], hint: &str| ConstraintError::Incomplete {
        path: join(path),
        hint: hint.to_string(),
    };
    match value {
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_) => Ok(()),
        Value::Struct(s) => {
            for (name, field) in &s.fields {
                if (field.definition && !opts.definitions) || (field.hidden && !opts.hidden) {
                    continue;
                }
                if field.optional {
                    continue;
                }
                let required = require_concrete && field.is_regular();
                path.push(name.clone());
                check(&field.value, opts, required, path)?;
                path.pop();
            }
            Ok(())
        }
        Value::List(l) => {
            if require_concrete && l.rest.is_some() {
                return Err(incomplete(path, "open list"));
            }
            for (index, elem) in l.elems.iter().enumerate() {
                path.push(index.to_string());
                check(elem, opts, require_concrete, path)?;
                path.pop();
            }
            Ok(())
        }
        Value::Top if require_concrete => Err(incomplete(path, "_")),
        Value::Type(t) if require_concrete => Err(incomplete(path, t.name())),
        Value::Disjunction(_) if require_concrete => Err(incomplete(path, "unresolved disjunction")),
        Value::Reference(name) if require_concrete => Err(ConstraintError::UndefinedReference {
            name: name.clone(),
        }),
        _ => Ok(()),
    }
}
