//! Structured value model consumed by the codecs.
//!
//! A [`Value`] is self-describing: scalars, buffers, timestamps, enums,
//! lists, identifier-keyed field maps and structs tagged with a qualified
//! type name.

mod identifier;
mod path;

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use identifier::{IdFormat, Identifier, TypeName, TypeRef};
pub use path::ObjectPath;

/// Failure to parse an identifier, type name or type reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseError(String);

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Identifier-keyed fields. Ordered by key so encodings are deterministic.
pub type FieldMap = BTreeMap<Identifier, Value>;

/// An enum constant tagged with its type.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub type_name: TypeName,
    pub constant: Identifier,
}

/// A field map tagged with its type.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    pub type_name: TypeName,
    pub fields: FieldMap,
}

impl StructValue {
    pub fn new(type_name: TypeName) -> Self {
        Self {
            type_name,
            fields: FieldMap::new(),
        }
    }

    pub fn with_field(mut self, key: Identifier, value: impl Into<Value>) -> Self {
        self.fields.insert(key, value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        let key = Identifier::parse(key).ok()?;
        self.fields.get(&key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Buffer(Bytes),
    Timestamp(DateTime<Utc>),
    Enum(EnumValue),
    List(Vec<Value>),
    Map(FieldMap),
    Struct(StructValue),
}

impl Value {
    /// Short name of the value kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
            Value::Buffer(_) => "buffer",
            Value::Timestamp(_) => "timestamp",
            Value::Enum(_) => "enum",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Struct(_) => "struct",
        }
    }

    /// Smallest integer kind holding `n`.
    pub fn from_integer(n: i64) -> Self {
        match i32::try_from(n) {
            Ok(small) => Value::Int32(small),
            Err(_) => Value::Int64(n),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Buffer contents, accepting a base64 string in place of a buffer.
    pub fn to_bytes(&self) -> Option<Bytes> {
        match self {
            Value::Buffer(b) => Some(b.clone()),
            Value::String(s) => STANDARD.decode(s).ok().map(Bytes::from),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(n) => Some(f64::from(*n)),
            Value::Int64(n) => Some(*n as f64),
            Value::Float32(n) => Some(f64::from(*n)),
            Value::Float64(n) => Some(*n),
            _ => None,
        }
    }

    /// Equality with the model's coercions applied.
    ///
    /// Numbers compare by value across widths. A string matches a timestamp
    /// that it parses to as RFC 3339, a buffer it base64-decodes to, or an
    /// enum constant it parses to. Containers compare element-wise with the
    /// same rules.
    pub fn equivalent(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::String(s), other) | (other, Value::String(s))
                if !matches!(other, Value::String(_)) =>
            {
                string_matches(s, other)
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y))
            }
            (Value::Map(a), Value::Map(b)) => maps_equivalent(a, b),
            (Value::Struct(a), Value::Struct(b)) => {
                a.type_name == b.type_name && maps_equivalent(&a.fields, &b.fields)
            }
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            },
        }
    }
}

fn string_matches(s: &str, other: &Value) -> bool {
    match other {
        Value::Timestamp(t) => DateTime::parse_from_rfc3339(s)
            .map(|parsed| parsed.with_timezone(&Utc) == *t)
            .unwrap_or(false),
        Value::Buffer(b) => STANDARD.decode(s).map(|d| d == b[..]).unwrap_or(false),
        Value::Enum(e) => Identifier::parse(s).map(|id| id == e.constant).unwrap_or(false),
        _ => false,
    }
}

fn maps_equivalent(a: &FieldMap, b: &FieldMap) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|((ka, va), (kb, vb))| ka == kb && va.equivalent(vb))
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float64(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Buffer(b)
    }
}

impl From<StructValue> for Value {
    fn from(s: StructValue) -> Self {
        Value::Struct(s)
    }
}

impl From<EnumValue> for Value {
    fn from(e: EnumValue) -> Self {
        Value::Enum(e)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}
