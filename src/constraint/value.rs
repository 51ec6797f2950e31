//! Constraint values.
//!
//! A [`Value`] is the common currency of the evaluator: schema fragments
//! parse into abstract values (type atoms, disjunctions, references), input
//! documents parse into concrete values, and unification merges the two.

use std::collections::BTreeMap;

use super::ConstraintError;

/// Type atoms of the constraint language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    String,
    Number,
    Int,
    Float,
    Bool,
}

impl TypeKind {
    /// The keyword spelling of this atom.
    pub fn name(&self) -> &'static str {
        match self {
            TypeKind::String => "string",
            TypeKind::Number => "number",
            TypeKind::Int => "int",
            TypeKind::Float => "float",
            TypeKind::Bool => "bool",
        }
    }

    /// Whether a concrete value satisfies this atom.
    pub(crate) fn admits(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (TypeKind::String, Value::String(_))
                | (TypeKind::Bool, Value::Bool(_))
                | (TypeKind::Int, Value::Int(_))
                | (TypeKind::Float, Value::Float(_))
                | (TypeKind::Number, Value::Int(_))
                | (TypeKind::Number, Value::Float(_))
        )
    }
}

/// An attribute annotation attached to a field, e.g. `@tag(query)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub body: String,
}

/// A single struct field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub value: Value,
    /// Declared with a `?` marker; imposes nothing when absent from a document.
    pub optional: bool,
    /// Label starts with `_`.
    pub hidden: bool,
    /// Label starts with `#`.
    pub definition: bool,
    pub attributes: Vec<Attribute>,
}

impl Field {
    /// A plain required data field.
    pub fn required(value: Value) -> Self {
        Self {
            value,
            optional: false,
            hidden: false,
            definition: false,
            attributes: Vec::new(),
        }
    }

    /// True for data fields; hidden fields and definitions are schema
    /// machinery and are exempt from closedness checks.
    pub fn is_regular(&self) -> bool {
        !self.hidden && !self.definition
    }
}

/// A struct value. Closed structs reject fields they do not declare when
/// unified with another operand.
#[derive(Debug, Clone, PartialEq)]
pub struct StructVal {
    pub fields: BTreeMap<String, Field>,
    pub open: bool,
}

impl StructVal {
    /// An empty struct accepting any field.
    pub fn open() -> Self {
        Self {
            fields: BTreeMap::new(),
            open: true,
        }
    }

    /// An empty struct accepting only declared fields.
    pub fn closed() -> Self {
        Self {
            fields: BTreeMap::new(),
            open: false,
        }
    }
}

/// A list value: a fixed prefix plus an optional `...elem` tail constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct ListVal {
    pub elems: Vec<Value>,
    pub rest: Option<Box<Value>>,
}

/// A value of the constraint language.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// `_`, the top value: unifies with anything.
    Top,
    /// A type atom such as `string` or `number`.
    Type(TypeKind),
    List(ListVal),
    Struct(StructVal),
    /// `a | b | ...`: valid iff exactly one alternative unifies.
    Disjunction(Vec<Value>),
    /// An unresolved reference to a `#definition`.
    Reference(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Walk a dotted field path, e.g. `display.name`.
    ///
    /// Only struct fields are addressable; returns `None` as soon as a
    /// segment is missing or the current value is not a struct.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        for segment in path.split('.') {
            match current {
                Value::Struct(s) => current = &s.fields.get(segment)?.value,
                _ => return None,
            }
        }
        Some(current)
    }

    /// True when the value is a fully resolved literal. Optional struct
    /// fields and non-data fields do not count against concreteness.
    pub fn is_concrete(&self) -> bool {
        match self {
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_) => {
                true
            }
            Value::List(l) => l.rest.is_none() && l.elems.iter().all(Value::is_concrete),
            Value::Struct(s) => s
                .fields
                .values()
                .filter(|f| f.is_regular() && !f.optional)
                .all(|f| f.value.is_concrete()),
            Value::Top | Value::Type(_) | Value::Disjunction(_) | Value::Reference(_) => false,
        }
    }

    /// Short rendering used in error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => format!("{s:?}"),
            Value::Top => "_".to_string(),
            Value::Type(t) => t.name().to_string(),
            Value::List(l) => format!("list({} elements)", l.elems.len()),
            Value::Struct(_) => "struct".to_string(),
            Value::Disjunction(alts) => alts
                .iter()
                .map(Value::describe)
                .collect::<Vec<_>>()
                .join(" | "),
            Value::Reference(name) => name.clone(),
        }
    }

    /// Parse a raw JSON document into a concrete value.
    ///
    /// Objects become open structs so that schema closedness, not document
    /// shape, decides which fields are allowed.
    pub fn from_json_bytes(raw: &[u8]) -> Result<Value, ConstraintError> {
        let json: serde_json::Value =
            serde_json::from_slice(raw).map_err(|e| ConstraintError::Document(e.to_string()))?;
        Ok(Self::from_json(&json))
    }

    /// Convert an already-parsed JSON value.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::List(ListVal {
                elems: items.iter().map(Self::from_json).collect(),
                rest: None,
            }),
            serde_json::Value::Object(map) => {
                let mut s = StructVal::open();
                for (name, item) in map {
                    s.fields
                        .insert(name.clone(), Field::required(Self::from_json(item)));
                }
                Value::Struct(s)
            }
        }
    }
}
