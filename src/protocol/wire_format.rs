//! Wire format encoding and decoding.
//!
//! All integers are little-endian and every variable-length item carries an
//! explicit length:
//!
//! ```text
//! int32   : 4 bytes, signed LE
//! int64   : 8 bytes, signed LE
//! utf8    : int32 byte length, then the bytes
//! headers : int32 version (= 1)
//!           { int32 FIELD (= 1), utf8 key, utf8 value }*
//!           int32 END (= 2)
//! ```
//!
//! Writes are buffered into a `BytesMut` and only reach the stream on
//! [`WireWriter::flush`]. Reads go straight to the stream with `read_exact`
//! and never consume more than the item being decoded.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::Headers;
use crate::error::{ConformanceError, Result};

/// Header block format version.
pub const HEADERS_VERSION: u32 = 0x0000_0001;

/// Type code preceding each header field.
pub const FIELD_CODE: u32 = 0x01;

/// Type code terminating a header block.
pub const END_CODE: u32 = 0x02;

/// Default maximum length accepted for a single buffer or body (1 GB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u64 = 1_073_741_824;

/// Buffered encoder over an async byte sink.
pub struct WireWriter<W> {
    inner: W,
    buffer: BytesMut,
}

impl<W: AsyncWrite + Unpin> WireWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    pub fn write_i32(&mut self, n: i32) {
        self.buffer.put_i32_le(n);
    }

    /// Same bytes as `write_i32`; for version tags and type codes.
    pub fn write_u32(&mut self, n: u32) {
        self.buffer.put_u32_le(n);
    }

    pub fn write_i64(&mut self, n: i64) {
        self.buffer.put_i64_le(n);
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buffer.put_slice(bytes);
    }

    /// int32 byte length followed by the raw bytes.
    ///
    /// Fails with `PayloadTooLarge` when the length does not fit an int32;
    /// nothing is buffered in that case.
    pub fn write_buffer32(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_i32(length_prefix(bytes.len())?);
        self.write_raw(bytes);
        Ok(())
    }

    pub fn write_utf8(&mut self, s: &str) -> Result<()> {
        self.write_buffer32(s.as_bytes())
    }

    pub fn write_headers(&mut self, headers: &Headers) -> Result<()> {
        self.write_u32(HEADERS_VERSION);
        for (key, value) in headers.iter() {
            self.write_u32(FIELD_CODE);
            self.write_utf8(key)?;
            self.write_utf8(value)?;
        }
        self.write_u32(END_CODE);
        Ok(())
    }

    /// Number of encoded bytes not yet flushed.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Write everything buffered so far and flush the stream.
    pub async fn flush(&mut self) -> Result<()> {
        let chunk = self.buffer.split().freeze();
        self.inner.write_all(&chunk).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Validate a byte count for an int32 length prefix.
fn length_prefix(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| ConformanceError::PayloadTooLarge {
        size: len as u64,
        max: i32::MAX as u64,
    })
}

/// Decoder over an async byte source.
pub struct WireReader<R> {
    inner: R,
    max_payload_size: u64,
}

impl<R: AsyncRead + Unpin> WireReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_max_payload(inner, DEFAULT_MAX_PAYLOAD_SIZE)
    }

    pub fn with_max_payload(inner: R, max_payload_size: u64) -> Self {
        Self {
            inner,
            max_payload_size,
        }
    }

    pub async fn read_i32(&mut self) -> Result<i32> {
        Ok(self.inner.read_i32_le().await?)
    }

    pub async fn read_u32(&mut self) -> Result<u32> {
        Ok(self.inner.read_u32_le().await?)
    }

    pub async fn read_i64(&mut self) -> Result<i64> {
        Ok(self.inner.read_i64_le().await?)
    }

    /// Read a type code and fail unless it is `expected`.
    pub async fn expect_code(&mut self, expected: u32) -> Result<()> {
        let actual = self.read_u32().await?;
        if actual != expected {
            return Err(ConformanceError::InvalidType { actual, expected });
        }
        Ok(())
    }

    /// Read exactly `len` bytes after validating the declared length.
    pub async fn read_exact_len(&mut self, len: i64) -> Result<Bytes> {
        if len < 0 {
            return Err(ConformanceError::InvalidLength(len));
        }
        let size = len as u64;
        if size > self.max_payload_size {
            return Err(ConformanceError::PayloadTooLarge {
                size,
                max: self.max_payload_size,
            });
        }
        if size == 0 {
            return Ok(Bytes::new());
        }

        // Grow with the data actually received; a lying length prefix must
        // not reserve the whole declared size up front.
        let mut buf = Vec::new();
        (&mut self.inner).take(size).read_to_end(&mut buf).await?;
        if (buf.len() as u64) < size {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, got {}", size, buf.len()),
            )
            .into());
        }
        Ok(Bytes::from(buf))
    }

    /// int32 length followed by that many raw bytes.
    pub async fn read_buffer32(&mut self) -> Result<Bytes> {
        let len = self.read_i32().await?;
        self.read_exact_len(i64::from(len)).await
    }

    pub async fn read_utf8(&mut self) -> Result<String> {
        let bytes = self.read_buffer32().await?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    /// Decode a header block. A repeated key overwrites the earlier value.
    pub async fn read_headers(&mut self) -> Result<Headers> {
        let version = self.read_u32().await?;
        if version != HEADERS_VERSION {
            return Err(ConformanceError::InvalidHeadersVersion {
                actual: version,
                expected: HEADERS_VERSION,
            });
        }

        let mut headers = Headers::new();
        loop {
            match self.read_u32().await? {
                FIELD_CODE => {
                    let key = self.read_utf8().await?;
                    let value = self.read_utf8().await?;
                    headers.insert(key, value);
                }
                END_CODE => return Ok(headers),
                code => return Err(ConformanceError::UnknownType(code)),
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
