//! Codec module - structured value encodings.
//!
//! - [`JsonCodec`] - JSON mapping with strict, path-qualified decoding
//! - [`CodecOptions`] - enum expansion, identifier format, type field switches
//!
//! # Example
//!
//! ```
//! use value_conformance::codec::{CodecOptions, JsonCodec};
//!
//! let illegal = CodecOptions {
//!     expand_enums: true,
//!     omit_type_fields: true,
//!     ..Default::default()
//! };
//! assert!(JsonCodec::new(illegal).is_err());
//! ```

mod json;
mod options;

pub use json::{JsonCodec, CONSTANT_KEY, TYPE_KEY};
pub use options::{CodecOptions, EXPAND_ENUMS, ID_FORMAT, OMIT_TYPE_FIELDS};
