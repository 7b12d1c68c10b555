//! Headers and messages, and the message-level framing.
//!
//! ```text
//! ┌─────────┬──────────┬──────────────┬──────────┬─────────────┬────────┐
//! │ Version │ Code = 1 │ Header block │ Code = 2 │ Body length │ Body   │
//! │ i32 LE  │ i32 LE   │              │ i32 LE   │ i64 LE      │ N bytes│
//! └─────────┴──────────┴──────────────┴──────────┴─────────────┴────────┘
//! ```

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use super::wire_format::{WireReader, WireWriter};
use crate::error::{ConformanceError, Result};

/// Message format version.
pub const MESSAGE_VERSION: u32 = 0x0000_0001;

/// Section code preceding the header block.
pub const HEADERS_SECTION: u32 = 1;

/// Section code preceding the body.
pub const BODY_SECTION: u32 = 2;

/// Ordered key/value pairs with string values.
///
/// Keys are unique: inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// A header block plus an opaque body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub headers: Headers,
    pub body: Bytes,
}

impl Message {
    pub fn new(headers: Headers, body: Bytes) -> Self {
        Self { headers, body }
    }

    pub fn from_headers(headers: Headers) -> Self {
        Self {
            headers,
            body: Bytes::new(),
        }
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }
}

impl<W: AsyncWrite + Unpin> WireWriter<W> {
    /// Write a whole message and flush it to the stream.
    pub async fn write_message(&mut self, message: &Message) -> Result<()> {
        self.write_u32(MESSAGE_VERSION);
        self.write_u32(HEADERS_SECTION);
        self.write_headers(&message.headers)?;
        self.write_u32(BODY_SECTION);
        let len = message.body.len();
        self.write_i64(i64::try_from(len).map_err(|_| ConformanceError::PayloadTooLarge {
            size: len as u64,
            max: i64::MAX as u64,
        })?);
        self.write_raw(&message.body);
        self.flush().await
    }
}

impl<R: AsyncRead + Unpin> WireReader<R> {
    /// Read one message; stops exactly at the end of the body.
    pub async fn read_message(&mut self) -> Result<Message> {
        let version = self.read_u32().await?;
        if version != MESSAGE_VERSION {
            return Err(ConformanceError::InvalidMessageVersion {
                actual: version,
                expected: MESSAGE_VERSION,
            });
        }

        self.expect_code(HEADERS_SECTION).await?;
        let headers = self.read_headers().await?;

        self.expect_code(BODY_SECTION).await?;
        let len = self.read_i64().await?;
        let body = self.read_exact_len(len).await?;

        Ok(Message::new(headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    async fn encode(messages: &[Message]) -> Vec<u8> {
        let mut writer = WireWriter::new(Vec::new());
        for m in messages {
            writer.write_message(m).await.unwrap();
        }
        writer.into_inner()
    }

    fn sample() -> Message {
        Message::new(
            Headers::new()
                .with("command", "get_spec")
                .with("codec_id", "json"),
            Bytes::from_static(b"{\"$type\":\"a.b\"}"),
        )
    }

    #[test]
    fn test_headers_insert_replaces_in_place() {
        let mut headers = Headers::new().with("a", "1").with("b", "2");
        headers.insert("a", "3");
        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn test_message_defaults_empty() {
        let message = Message::default();
        assert!(message.headers.is_empty());
        assert!(message.body.is_empty());
    }

    #[tokio::test]
    async fn test_message_roundtrip() {
        let bytes = encode(&[sample()]).await;
        let mut reader = WireReader::new(&bytes[..]);
        assert_eq!(reader.read_message().await.unwrap(), sample());
    }

    #[tokio::test]
    async fn test_empty_body_layout() {
        let bytes = encode(&[Message::default()]).await;
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            1, 0, 0, 0,             // message version
            1, 0, 0, 0,             // headers section
            1, 0, 0, 0,             // headers version
            2, 0, 0, 0,             // END
            2, 0, 0, 0,             // body section
            0, 0, 0, 0, 0, 0, 0, 0, // body length
        ];
        assert_eq!(bytes, expected);
    }

    #[tokio::test]
    async fn test_wrong_section_code() {
        let mut bytes = encode(&[Message::default()]).await;
        bytes[4] = 7;
        let mut reader = WireReader::new(&bytes[..]);
        let err = reader.read_message().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid type :code => 0x00000007 (expected 0x00000001)"
        );
    }

    #[tokio::test]
    async fn test_wrong_message_version() {
        let mut bytes = encode(&[Message::default()]).await;
        bytes[0] = 9;
        let mut reader = WireReader::new(&bytes[..]);
        let err = reader.read_message().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid message :version => 0x00000009 (expected 0x00000001)"
        );
    }

    #[tokio::test]
    async fn test_trailing_bytes_not_consumed() {
        let mut bytes = encode(&[sample()]).await;
        let payload_len = bytes.len();
        bytes.extend_from_slice(b"trailing garbage");

        let mut reader = WireReader::new(&bytes[..]);
        assert_eq!(reader.read_message().await.unwrap(), sample());
        let rest = reader.into_inner();
        assert_eq!(rest, &bytes[payload_len..]);
    }

    #[tokio::test]
    async fn test_truncated_body_is_io_error() {
        let bytes = encode(&[sample()]).await;
        let mut reader = WireReader::new(&bytes[..bytes.len() - 3]);
        assert!(matches!(
            reader.read_message().await,
            Err(ConformanceError::Io(_))
        ));
    }

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(f)
    }

    fn message_strategy() -> impl Strategy<Value = Message> {
        (
            prop::collection::vec(("[a-z][a-z_]{0,10}", ".{0,16}"), 0..4),
            prop::collection::vec(any::<u8>(), 0..64),
        )
            .prop_map(|(pairs, body)| {
                Message::new(pairs.into_iter().collect(), Bytes::from(body))
            })
    }

    proptest! {
        #[test]
        fn prop_messages_back_to_back(
            mut messages in prop::collection::vec(message_strategy(), 10),
            count in prop::sample::select(vec![1usize, 10]),
        ) {
            messages.truncate(count);
            messages.push(Message::default());
            let decoded = block_on(async {
                let bytes = encode(&messages).await;
                let mut reader = WireReader::new(&bytes[..]);
                let mut out = Vec::new();
                for _ in 0..messages.len() {
                    out.push(reader.read_message().await.unwrap());
                }
                assert!(reader.into_inner().is_empty());
                out
            });
            prop_assert_eq!(decoded, messages);
        }
    }
}
