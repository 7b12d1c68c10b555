//! Protocol module - wire primitives, header blocks and messages.
//!
//! This module implements the byte protocol spoken with a peer process:
//! - Length-prefixed little-endian primitives and header blocks
//! - Whole messages: version, headers section, body section

mod message;
mod wire_format;

pub use message::{Headers, Message, BODY_SECTION, HEADERS_SECTION, MESSAGE_VERSION};
pub use wire_format::{
    WireReader, WireWriter, DEFAULT_MAX_PAYLOAD_SIZE, END_CODE, FIELD_CODE, HEADERS_VERSION,
};
