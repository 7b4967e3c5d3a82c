use std::io::ErrorKind;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use avrpc_frame::{encode_message, FrameConfig, FrameError, MessageAssembler, HEADER_LEN};

use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::error::RpcError;

/// Server side of one connection: assembles framed requests, dispatches
/// them, and writes framed replies.
///
/// Requests are processed strictly one at a time in arrival order: the
/// next frame header is not read until the previous reply has been fully
/// written. Generic over the stream so it can be driven against
/// `tokio::io::duplex` in tests.
pub struct Connection<S> {
    stream: S,
    assembler: MessageAssembler,
    dispatcher: Arc<Dispatcher>,
    peer: String,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub fn new(stream: S, dispatcher: Arc<Dispatcher>, peer: impl Into<String>) -> Self {
        Self::with_config(stream, dispatcher, peer, &FrameConfig::default())
    }

    pub fn with_config(
        stream: S,
        dispatcher: Arc<Dispatcher>,
        peer: impl Into<String>,
        config: &FrameConfig,
    ) -> Self {
        Self {
            stream,
            assembler: MessageAssembler::with_max_message_size(config.max_message_size),
            dispatcher,
            peer: peer.into(),
        }
    }

    /// Drive the connection until the peer disconnects or a fatal
    /// per-connection error occurs.
    ///
    /// Nothing escapes: transport faults are logged and end this
    /// connection only, never the accept loop.
    pub async fn run(mut self) {
        loop {
            let message = match self.read_message().await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    debug!(peer = %self.peer, "peer disconnected");
                    return;
                }
                Err(err) => {
                    warn!(peer = %self.peer, error = %err, "connection torn down");
                    return;
                }
            };

            match self.dispatcher.dispatch(message).await {
                DispatchOutcome::Reply(reply) => {
                    if let Err(err) = self.write_reply(&reply).await {
                        // The peer is gone; a reply with no observer is
                        // dropped, not escalated.
                        debug!(peer = %self.peer, error = %err, "reply write failed, closing");
                        return;
                    }
                    self.assembler.reset();
                }
                DispatchOutcome::Disconnect => {
                    debug!(peer = %self.peer, "dropping connection per failure policy");
                    return;
                }
            }
        }
    }

    /// Read exactly one complete message.
    ///
    /// `Ok(None)` means the peer closed cleanly between messages. EOF with
    /// a message in progress — mid-header, mid-payload, or before the
    /// sentinel — is `ConnectionClosed`.
    async fn read_message(&mut self) -> Result<Option<Bytes>, RpcError> {
        loop {
            let header = match self.read_header().await? {
                Some(header) => header,
                None => return Ok(None),
            };

            self.assembler.feed_header(header)?;
            if self.assembler.is_complete() {
                return Ok(Some(self.assembler.take()));
            }

            let mut payload = vec![0u8; self.assembler.needed()];
            self.stream
                .read_exact(&mut payload)
                .await
                .map_err(map_read_err)?;
            self.assembler.feed_payload(&payload);
        }
    }

    /// Read one 4-byte frame header.
    ///
    /// `Ok(None)` only when EOF arrives before the first header byte of a
    /// fresh message; EOF after a partial header, or between the frames of
    /// a message, is `ConnectionClosed`.
    async fn read_header(&mut self) -> Result<Option<[u8; HEADER_LEN]>, RpcError> {
        let mut header = [0u8; HEADER_LEN];
        let mut filled = 0usize;
        while filled < HEADER_LEN {
            let read = self.stream.read(&mut header[filled..]).await?;
            if read == 0 {
                if filled == 0 && self.assembler.is_empty() {
                    return Ok(None);
                }
                return Err(RpcError::Frame(FrameError::ConnectionClosed));
            }
            filled += read;
        }
        Ok(Some(header))
    }

    async fn write_reply(&mut self, reply: &[u8]) -> std::io::Result<()> {
        let mut buf = BytesMut::new();
        encode_message(reply, &mut buf);
        self.stream.write_all(&buf).await?;
        self.stream.flush().await
    }
}

fn map_read_err(err: std::io::Error) -> RpcError {
    if err.kind() == ErrorKind::UnexpectedEof {
        RpcError::Frame(FrameError::ConnectionClosed)
    } else {
        RpcError::Io(err)
    }
}
