use std::io::{ErrorKind, Read};

use bytes::Bytes;

use crate::assembler::MessageAssembler;
use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete framed messages from any `Read` stream (blocking).
///
/// Handles partial reads internally; callers always get whole messages.
pub struct MessageReader<T> {
    inner: T,
    assembler: MessageAssembler,
    config: FrameConfig,
}

impl<T: Read> MessageReader<T> {
    /// Create a message reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a message reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            assembler: MessageAssembler::with_max_message_size(config.max_message_size),
            config,
        }
    }

    /// Read frames until the sentinel and return the assembled message.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` if the stream reaches
    /// EOF at any point, mid-header or mid-payload included.
    pub fn read_message(&mut self) -> Result<Bytes> {
        // Staged bytes from a previous call may already hold a message.
        if let Some(message) = self.assembler.feed(&[])? {
            self.assembler.reset();
            return Ok(message);
        }

        loop {
            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            if let Some(message) = self.assembler.feed(&chunk[..read])? {
                self.assembler.reset();
                return Ok(message);
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
