//! Peer command vocabulary.
//!
//! Every request is a message whose `command` header names the operation;
//! `codec_id` and `spec_key` qualify it where needed. A response carrying an
//! `exception` header is a remote failure.

use bytes::Bytes;

use crate::error::{ConformanceError, Result};
use crate::protocol::{Headers, Message};
use crate::transport::Exchange;

pub const COMMAND: &str = "command";
pub const CODEC_ID: &str = "codec_id";
pub const SPEC_KEY: &str = "spec_key";
pub const EXCEPTION: &str = "exception";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerCommand {
    /// List test identifiers for a codec; body is comma separated.
    GetSpecKeys,
    /// Fetch one encoded test spec.
    GetSpec,
    /// Ask the peer to verify our encoding of a spec's value.
    CheckEncode,
    /// Graceful shutdown signal.
    Close,
}

impl PeerCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerCommand::GetSpecKeys => "get_spec_keys",
            PeerCommand::GetSpec => "get_spec",
            PeerCommand::CheckEncode => "check_encode",
            PeerCommand::Close => "close",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "get_spec_keys" => Some(PeerCommand::GetSpecKeys),
            "get_spec" => Some(PeerCommand::GetSpec),
            "check_encode" => Some(PeerCommand::CheckEncode),
            "close" => Some(PeerCommand::Close),
            _ => None,
        }
    }
}

/// Build a request message for `command`.
pub fn request(
    command: PeerCommand,
    codec_id: Option<&str>,
    spec_key: Option<&str>,
    body: Bytes,
) -> Message {
    let mut headers = Headers::new().with(COMMAND, command.as_str());
    if let Some(codec_id) = codec_id {
        headers.insert(CODEC_ID, codec_id);
    }
    if let Some(spec_key) = spec_key {
        headers.insert(SPEC_KEY, spec_key);
    }
    Message::new(headers, body)
}

/// Turn an `exception` header into an error.
pub fn check_response(response: Message) -> Result<Message> {
    match response.header(EXCEPTION) {
        Some(exception) => Err(ConformanceError::Remote(exception.to_string())),
        None => Ok(response),
    }
}

/// Exchange one request and check the response for a remote failure.
pub async fn send<C: Exchange>(peer: &mut C, request: Message) -> Result<Message> {
    tracing::debug!(
        command = request.header(COMMAND).unwrap_or_default(),
        spec_key = request.header(SPEC_KEY).unwrap_or_default(),
        "Sending peer command"
    );
    let response = peer.exchange_message(request).await?;
    check_response(response)
}

/// Split a comma separated key list, ignoring blanks.
pub fn parse_spec_keys(body: &[u8]) -> Result<Vec<String>> {
    let text = std::str::from_utf8(body)
        .map_err(|e| ConformanceError::Remote(format!("Spec key list is not UTF-8: {}", e)))?;
    Ok(text
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect())
}
