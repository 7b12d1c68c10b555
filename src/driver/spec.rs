//! Conformance test specs and their structured value form.
//!
//! Peers send specs as `conformance.test-spec` structs:
//!
//! ```text
//! conformance.test-spec {
//!     id:       string (identifier)
//!     codec-id: string (identifier), optional
//!     headers:  [conformance.header { key: string, value: string }]
//!     action:   one of the action structs below
//! }
//! conformance.round-trip   { value: struct }
//! conformance.fail-decode  { error-message: string, input: buffer }
//! conformance.decode-input { input: buffer, expect: value }
//! conformance.encode-value { value: value }
//! ```
//!
//! Buffers may also arrive as base64 strings, which is how the JSON codec
//! carries them.

use bytes::Bytes;

use crate::error::{CodecError, Result};
use crate::protocol::Headers;
use crate::value::{Identifier, ObjectPath, StructValue, TypeName, Value};

pub const TEST_SPEC_TYPE: &str = "conformance.test-spec";
pub const HEADER_TYPE: &str = "conformance.header";
pub const ROUND_TRIP_TYPE: &str = "conformance.round-trip";
pub const FAIL_DECODE_TYPE: &str = "conformance.fail-decode";
pub const DECODE_INPUT_TYPE: &str = "conformance.decode-input";
pub const ENCODE_VALUE_TYPE: &str = "conformance.encode-value";

/// What a conformance case checks.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Encode then decode must reproduce an equal struct.
    RoundTrip(StructValue),
    /// Decoding `input` must fail with exactly `error_message`.
    FailDecode { error_message: String, input: Bytes },
    /// Decoding `input` must yield `expect`.
    DecodeInput { input: Bytes, expect: Value },
    /// Our encoding of the value must pass the peer's verification.
    EncodeValue(Value),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::RoundTrip(_) => "round-trip",
            Action::FailDecode { .. } => "fail-decode",
            Action::DecodeInput { .. } => "decode-input",
            Action::EncodeValue(_) => "encode-value",
        }
    }
}

/// One conformance case.
#[derive(Debug, Clone, PartialEq)]
pub struct TestSpec {
    pub id: Identifier,
    pub codec_id: Option<Identifier>,
    /// Arbitrary metadata, e.g. codec option overrides.
    pub headers: Headers,
    pub action: Action,
}

impl TestSpec {
    pub fn new(id: Identifier, action: Action) -> Self {
        Self {
            id,
            codec_id: None,
            headers: Headers::new(),
            action,
        }
    }

    pub fn with_codec_id(mut self, codec_id: Identifier) -> Self {
        self.codec_id = Some(codec_id);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// `id`, or `id/codec_id` when a codec id is present.
    pub fn key(&self) -> String {
        match &self.codec_id {
            Some(codec_id) => format!("{}/{}", self.id, codec_id),
            None => self.id.to_string(),
        }
    }

    pub fn from_value(value: &StructValue) -> Result<Self> {
        let root = ObjectPath::root();
        expect_type(value, TEST_SPEC_TYPE, &root)?;

        let id = identifier_field(value, "id", &root)?;
        let codec_id = match value.get("codec-id") {
            None | Some(Value::Null) => None,
            Some(_) => Some(identifier_field(value, "codec-id", &root)?),
        };

        let mut headers = Headers::new();
        if let Some(list) = value.get("headers") {
            let path = root.field("headers");
            let items = match list {
                Value::List(items) => items,
                _ => return Err(CodecError::at(&path, "Expected a list").into()),
            };
            for (i, item) in items.iter().enumerate() {
                let item_path = path.index(i);
                let header = struct_field(item, &item_path)?;
                expect_type(header, HEADER_TYPE, &item_path)?;
                headers.insert(
                    string_field(header, "key", &item_path)?,
                    string_field(header, "value", &item_path)?,
                );
            }
        }

        let action_path = root.field("action");
        let action = action_from_value(
            struct_field(required(value, "action", &root)?, &action_path)?,
            &action_path,
        )?;

        Ok(Self {
            id,
            codec_id,
            headers,
            action,
        })
    }

    pub fn to_value(&self) -> StructValue {
        let headers: Vec<Value> = self
            .headers
            .iter()
            .map(|(k, v)| {
                Value::Struct(
                    StructValue::new(type_name(HEADER_TYPE))
                        .with_field(ident("key"), k)
                        .with_field(ident("value"), v),
                )
            })
            .collect();

        let mut spec = StructValue::new(type_name(TEST_SPEC_TYPE))
            .with_field(ident("id"), self.id.to_string())
            .with_field(ident("headers"), headers)
            .with_field(ident("action"), action_to_value(&self.action));
        if let Some(codec_id) = &self.codec_id {
            spec = spec.with_field(ident("codec-id"), codec_id.to_string());
        }
        spec
    }
}

fn action_from_value(action: &StructValue, path: &ObjectPath) -> Result<Action> {
    let type_name = action.type_name.to_string();
    let action = match type_name.as_str() {
        ROUND_TRIP_TYPE => {
            let value_path = path.field("value");
            Action::RoundTrip(struct_field(required(action, "value", path)?, &value_path)?.clone())
        }
        FAIL_DECODE_TYPE => Action::FailDecode {
            error_message: string_field(action, "error-message", path)?,
            input: bytes_field(action, "input", path)?,
        },
        DECODE_INPUT_TYPE => Action::DecodeInput {
            input: bytes_field(action, "input", path)?,
            expect: required(action, "expect", path)?.clone(),
        },
        ENCODE_VALUE_TYPE => Action::EncodeValue(required(action, "value", path)?.clone()),
        other => {
            return Err(CodecError::at(path, format!("Unknown action type \"{}\"", other)).into())
        }
    };
    Ok(action)
}

fn action_to_value(action: &Action) -> Value {
    let value = match action {
        Action::RoundTrip(value) => StructValue::new(type_name(ROUND_TRIP_TYPE))
            .with_field(ident("value"), value.clone()),
        Action::FailDecode {
            error_message,
            input,
        } => StructValue::new(type_name(FAIL_DECODE_TYPE))
            .with_field(ident("error-message"), error_message.as_str())
            .with_field(ident("input"), input.clone()),
        Action::DecodeInput { input, expect } => StructValue::new(type_name(DECODE_INPUT_TYPE))
            .with_field(ident("input"), input.clone())
            .with_field(ident("expect"), expect.clone()),
        Action::EncodeValue(value) => StructValue::new(type_name(ENCODE_VALUE_TYPE))
            .with_field(ident("value"), value.clone()),
    };
    Value::Struct(value)
}

// The names below are compile-time constants known to parse.
fn ident(name: &str) -> Identifier {
    Identifier::parse(name).unwrap_or_else(|e| panic!("bad built-in identifier: {}", e))
}

fn type_name(name: &str) -> TypeName {
    TypeName::parse(name).unwrap_or_else(|e| panic!("bad built-in type name: {}", e))
}

fn expect_type(value: &StructValue, expected: &str, path: &ObjectPath) -> Result<()> {
    if value.type_name.to_string() != expected {
        return Err(CodecError::at(
            path,
            format!("Expected a {} struct, got {}", expected, value.type_name),
        )
        .into());
    }
    Ok(())
}

fn required<'a>(value: &'a StructValue, key: &str, path: &ObjectPath) -> Result<&'a Value> {
    value
        .get(key)
        .ok_or_else(|| CodecError::at(&path.field(key), "Missing required field").into())
}

fn struct_field<'a>(value: &'a Value, path: &ObjectPath) -> Result<&'a StructValue> {
    value
        .as_struct()
        .ok_or_else(|| CodecError::at(path, format!("Expected a struct, got {}", value.kind())).into())
}

fn string_field(value: &StructValue, key: &str, path: &ObjectPath) -> Result<String> {
    let field = required(value, key, path)?;
    field
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| CodecError::at(&path.field(key), "Expected a string").into())
}

fn identifier_field(value: &StructValue, key: &str, path: &ObjectPath) -> Result<Identifier> {
    let text = string_field(value, key, path)?;
    Identifier::parse(&text).map_err(|e| CodecError::at(&path.field(key), e.to_string()).into())
}

fn bytes_field(value: &StructValue, key: &str, path: &ObjectPath) -> Result<Bytes> {
    required(value, key, path)?
        .to_bytes()
        .ok_or_else(|| CodecError::at(&path.field(key), "Expected a buffer").into())
}
