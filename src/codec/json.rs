//! JSON mapping for structured values.
//!
//! | Value          | JSON                                                  |
//! |----------------|-------------------------------------------------------|
//! | null / boolean | `null` / `true`, `false`                              |
//! | string         | string                                                |
//! | numbers        | number                                                |
//! | buffer         | base64 string (standard alphabet, padded)             |
//! | timestamp      | RFC 3339 string                                       |
//! | map            | object, keys rendered with the configured `IdFormat`  |
//! | struct         | map object plus `"$type"` unless `omit_type_fields`   |
//! | enum           | constant string, or `{"$type", "$constant"}` expanded |
//! | list           | array                                                 |
//!
//! Decoding is strict: control keys are validated, identifiers are parsed
//! and every failure names the object path where it happened.
//!
//! # Example
//!
//! ```
//! use value_conformance::codec::{CodecOptions, JsonCodec};
//!
//! let codec = JsonCodec::new(CodecOptions::default()).unwrap();
//! let point = codec.from_buffer(br#"{"$type":"geometry.point","x":1}"#).unwrap();
//! assert_eq!(point.type_name.to_string(), "geometry.point");
//!
//! let err = codec.from_buffer(b"{}").unwrap_err();
//! assert_eq!(err.to_string(), "Missing type key (\"$type\")");
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use chrono::SecondsFormat;
use serde_json::{Map, Number, Value as Json};

use super::CodecOptions;
use crate::error::{CodecError, Result};
use crate::value::{
    EnumValue, FieldMap, Identifier, ObjectPath, StructValue, TypeName, TypeRef, Value,
};

/// Control key holding a struct or enum type.
pub const TYPE_KEY: &str = "$type";

/// Control key holding an expanded enum constant.
pub const CONSTANT_KEY: &str = "$constant";

const MISSING_TYPE_KEY: &str = "Missing type key (\"$type\")";

type CodecResult<T> = std::result::Result<T, CodecError>;

/// Bidirectional structured value ⇄ JSON codec.
#[derive(Debug, Clone)]
pub struct JsonCodec {
    options: CodecOptions,
}

impl JsonCodec {
    /// Create a codec, rejecting illegal option combinations up front.
    pub fn new(options: CodecOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Encode a value as UTF-8 JSON text.
    pub fn as_buffer(&self, value: &Value) -> CodecResult<Bytes> {
        let json = self.encode_value(value, &ObjectPath::root())?;
        let text = serde_json::to_vec(&json).map_err(|e| CodecError::new(e.to_string()))?;
        Ok(Bytes::from(text))
    }

    /// Map a value to its JSON form.
    pub fn encode_value(&self, value: &Value, path: &ObjectPath) -> CodecResult<Json> {
        let json = match value {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::String(s) => Json::String(s.clone()),
            Value::Int32(n) => Json::from(*n),
            Value::Int64(n) => Json::from(*n),
            Value::Float32(n) => float_to_json(f64::from(*n), value, path)?,
            Value::Float64(n) => float_to_json(*n, value, path)?,
            Value::Buffer(b) => Json::String(STANDARD.encode(b)),
            Value::Timestamp(t) => Json::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Map(fields) => Json::Object(self.encode_fields(fields, path)?),
            Value::Struct(s) => {
                let mut object = Map::new();
                if !self.options.omit_type_fields {
                    object.insert(TYPE_KEY.to_string(), Json::String(s.type_name.to_string()));
                }
                object.extend(self.encode_fields(&s.fields, path)?);
                Json::Object(object)
            }
            Value::Enum(e) => {
                let constant = Json::String(e.constant.format(self.options.id_format));
                if self.options.expand_enums {
                    let mut object = Map::new();
                    object.insert(TYPE_KEY.to_string(), Json::String(e.type_name.to_string()));
                    object.insert(CONSTANT_KEY.to_string(), constant);
                    Json::Object(object)
                } else {
                    constant
                }
            }
            Value::List(items) => Json::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.encode_value(item, &path.index(i)))
                    .collect::<CodecResult<Vec<_>>>()?,
            ),
        };
        Ok(json)
    }

    fn encode_fields(&self, fields: &FieldMap, path: &ObjectPath) -> CodecResult<Map<String, Json>> {
        let mut object = Map::new();
        for (key, value) in fields {
            let name = key.format(self.options.id_format);
            let json = self.encode_value(value, &path.field(&name))?;
            object.insert(name, json);
        }
        Ok(object)
    }

    /// Decode UTF-8 JSON text into a struct.
    pub fn from_buffer(&self, bytes: &[u8]) -> CodecResult<StructValue> {
        let json: Json = serde_json::from_slice(bytes)
            .map_err(|e| CodecError::new(format!("Invalid JSON: {}", e)))?;

        let object = match json {
            Json::Object(object) => object,
            _ => return Err(CodecError::new("unexpected top level JSON value")),
        };
        if object.is_empty() {
            return Err(CodecError::new(MISSING_TYPE_KEY));
        }

        match self.decode_object(&object, &ObjectPath::root())? {
            Value::Struct(s) => Ok(s),
            other => Err(CodecError::new(format!(
                "Expected a struct at top level, got {}",
                other.kind()
            ))),
        }
    }

    /// Decode any JSON value found at `path`.
    pub fn decode_value(&self, json: &Json, path: &ObjectPath) -> CodecResult<Value> {
        match json {
            Json::Object(object) => self.decode_object(object, path),
            Json::Array(items) => Ok(Value::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.decode_value(item, &path.index(i)))
                    .collect::<CodecResult<Vec<_>>>()?,
            )),
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Number(n) => Ok(number_to_value(n)),
        }
    }

    /// Decode a JSON object into an enum, a struct or a bare field map.
    pub fn decode_object(&self, object: &Map<String, Json>, path: &ObjectPath) -> CodecResult<Value> {
        let constant = match object.get(CONSTANT_KEY) {
            Some(json) => {
                let key_path = path.field(CONSTANT_KEY);
                let text = json
                    .as_str()
                    .ok_or_else(|| CodecError::at(&key_path, "Expected a string"))?;
                Some(Identifier::parse(text).map_err(|e| CodecError::at(&key_path, e.to_string()))?)
            }
            None => None,
        };

        let type_name = match object.get(TYPE_KEY) {
            Some(json) => Some(parse_type_key(json, &path.field(TYPE_KEY))?),
            None => None,
        };

        if let Some(constant) = constant {
            let type_name = type_name.ok_or_else(|| CodecError::at(path, MISSING_TYPE_KEY))?;
            if object.len() > 2 {
                return Err(CodecError::at(path, "Enum has one or more unrecognized keys"));
            }
            return Ok(Value::Enum(EnumValue {
                type_name,
                constant,
            }));
        }

        let mut fields = FieldMap::new();
        for (key, json) in object {
            if key == TYPE_KEY {
                continue;
            }
            let field_path = path.field(key);
            if key.starts_with('$') {
                return Err(CodecError::at(
                    &field_path,
                    format!("Unrecognized control key \"{}\"", key),
                ));
            }
            let id = Identifier::parse(key).map_err(|e| CodecError::at(&field_path, e.to_string()))?;
            let value = self.decode_value(json, &field_path)?;
            fields.insert(id, value);
        }

        Ok(match type_name {
            Some(type_name) => Value::Struct(StructValue { type_name, fields }),
            None => Value::Map(fields),
        })
    }
}

fn float_to_json(n: f64, value: &Value, path: &ObjectPath) -> CodecResult<Json> {
    Number::from_f64(n)
        .map(Json::Number)
        .ok_or_else(|| CodecError::at(path, format!("Can't convert {} {} to JSON", value.kind(), n)))
}

fn number_to_value(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::from_integer(i)
    } else {
        // u64 beyond i64 range or a fractional number
        Value::Float64(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn parse_type_key(json: &Json, path: &ObjectPath) -> CodecResult<TypeName> {
    let text = json
        .as_str()
        .ok_or_else(|| CodecError::at(path, "Expected a string"))?;
    let type_ref = TypeRef::parse(text).map_err(|e| CodecError::at(path, e.to_string()))?;
    let type_name = type_ref.as_atomic().ok_or_else(|| {
        CodecError::at(path, format!("Expected an atomic type reference, got \"{}\"", text))
    })?;
    if !type_name.is_qualified() {
        return Err(CodecError::at(
            path,
            format!("Type name \"{}\" is not qualified", text),
        ));
    }
    Ok(type_name.clone())
}
