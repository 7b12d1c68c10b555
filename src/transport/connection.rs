//! Framed request/response over a pair of byte streams.

use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;
use crate::protocol::{Message, WireReader, WireWriter};

/// Something that can answer one request message with one response message.
///
/// Implementors must not pipeline: a second request is only written after
/// the previous response has been read in full.
pub trait Exchange: Send + 'static {
    fn exchange_message(&mut self, request: Message) -> impl Future<Output = Result<Message>> + Send;
}

/// A reader/writer pair framed with the message protocol.
pub struct Connection<R, W> {
    reader: WireReader<R>,
    writer: WireWriter<W>,
}

impl<R, W> Connection<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: WireReader::new(reader),
            writer: WireWriter::new(writer),
        }
    }

    pub async fn write_message(&mut self, message: &Message) -> Result<()> {
        self.writer.write_message(message).await
    }

    pub async fn read_message(&mut self) -> Result<Message> {
        self.reader.read_message().await
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader.into_inner(), self.writer.into_inner())
    }
}

impl<R, W> Exchange for Connection<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn exchange_message(&mut self, request: Message) -> impl Future<Output = Result<Message>> + Send {
        async move {
            self.write_message(&request).await?;
            self.read_message().await
        }
    }
}
