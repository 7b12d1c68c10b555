//! JSON codec options.

use serde::Deserialize;

use crate::error::{ConformanceError, Result};
use crate::protocol::Headers;
use crate::value::IdFormat;

/// Option key: emit enums as `{"$type", "$constant"}` objects.
pub const EXPAND_ENUMS: &str = "expand_enums";

/// Option key: identifier rendering mode.
pub const ID_FORMAT: &str = "id_format";

/// Option key: drop `"$type"` from encoded structs.
pub const OMIT_TYPE_FIELDS: &str = "omit_type_fields";

/// Behavior switches for [`JsonCodec`](super::JsonCodec).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    pub expand_enums: bool,
    pub id_format: IdFormat,
    pub omit_type_fields: bool,
}

impl CodecOptions {
    /// Read options from a header block.
    ///
    /// Values are the canonical strings `true` / `false` and id format
    /// names. Keys other than the option keys are ignored.
    pub fn from_headers(headers: &Headers) -> Result<Self> {
        let mut options = CodecOptions::default();
        if let Some(v) = headers.get(EXPAND_ENUMS) {
            options.expand_enums = parse_bool(EXPAND_ENUMS, v)?;
        }
        if let Some(v) = headers.get(ID_FORMAT) {
            options.id_format = v
                .parse()
                .map_err(|e| ConformanceError::InvalidOptions(format!("{}: {}", ID_FORMAT, e)))?;
        }
        if let Some(v) = headers.get(OMIT_TYPE_FIELDS) {
            options.omit_type_fields = parse_bool(OMIT_TYPE_FIELDS, v)?;
        }
        Ok(options)
    }

    /// Render as a header block, the inverse of [`from_headers`](Self::from_headers).
    pub fn to_headers(&self) -> Headers {
        Headers::new()
            .with(EXPAND_ENUMS, self.expand_enums.to_string())
            .with(ID_FORMAT, self.id_format.as_str())
            .with(OMIT_TYPE_FIELDS, self.omit_type_fields.to_string())
    }

    /// Reject combinations the codec cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.omit_type_fields && self.expand_enums {
            return Err(ConformanceError::InvalidOptions(format!(
                "{} requires type fields; cannot combine with {}",
                EXPAND_ENUMS, OMIT_TYPE_FIELDS
            )));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ConformanceError::InvalidOptions(format!(
            "{}: expected true or false, got \"{}\"",
            key, other
        ))),
    }
}
