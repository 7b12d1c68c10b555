//! Error types for value-conformance.

use std::fmt;

use thiserror::Error;

use crate::value::ObjectPath;

/// Main error type for framing, transport, codec and driver operations.
///
/// Framing messages are compared verbatim across implementations, so their
/// templates must not change.
#[derive(Debug, Error)]
pub enum ConformanceError {
    /// I/O error on the underlying byte stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid headers :version => 0x{actual:08x} (expected 0x{expected:08x})")]
    InvalidHeadersVersion { actual: u32, expected: u32 },

    #[error("Invalid message :version => 0x{actual:08x} (expected 0x{expected:08x})")]
    InvalidMessageVersion { actual: u32, expected: u32 },

    #[error("Unknown type :code => 0x{0:08x}")]
    UnknownType(u32),

    #[error("Invalid type :code => 0x{actual:08x} (expected 0x{expected:08x})")]
    InvalidType { actual: u32, expected: u32 },

    #[error("Invalid length => {0}")]
    InvalidLength(i64),

    #[error("Payload size {size} exceeds maximum {max}")]
    PayloadTooLarge { size: u64, max: u64 },

    #[error("Invalid UTF-8 string: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// JSON codec failure, path-qualified.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Illegal codec option combination or malformed option value.
    #[error("Invalid codec options: {0}")]
    InvalidOptions(String),

    /// The peer answered with an `exception` header.
    #[error("Remote failure: {0}")]
    Remote(String),

    /// Peer process exited unsuccessfully.
    #[error("Process {pid} exited with code {code}")]
    ProcessExit { pid: u32, code: i32 },

    /// Peer connection or driver queue is gone.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A queued driver operation panicked.
    #[error("Queued operation panicked: {0}")]
    Panicked(String),

    /// The driver's worker task panicked or was cancelled.
    #[error("Driver worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    /// A conformance case did not hold.
    #[error("Case {key} failed: {detail}")]
    CaseFailed { key: String, detail: String },
}

/// Result type alias using ConformanceError.
pub type Result<T> = std::result::Result<T, ConformanceError>;

/// JSON codec error located by an object path.
#[derive(Debug, Clone)]
pub struct CodecError {
    path: ObjectPath,
    message: String,
}

impl CodecError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            path: ObjectPath::root(),
            message: message.into(),
        }
    }

    pub fn at(path: &ObjectPath, message: impl Into<String>) -> Self {
        Self {
            path: path.clone(),
            message: message.into(),
        }
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// Message without the path prefix.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

impl std::error::Error for CodecError {}
