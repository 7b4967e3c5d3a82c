use bytes::{Buf, Bytes, BytesMut};

use crate::codec::{decode_header, DEFAULT_MAX_MESSAGE, HEADER_LEN};
use crate::error::{FrameError, Result};

/// Observable assembler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// Waiting for the next 4-byte frame header.
    AwaitingHeader,
    /// Waiting for the remainder of the current frame's payload.
    AwaitingPayload,
    /// A sentinel frame was observed; the message is complete.
    Complete,
}

#[derive(Debug, Clone, Copy)]
enum State {
    AwaitingHeader,
    AwaitingPayload { remaining: usize },
    Complete,
}

/// Incremental state machine that assembles one framed message from a
/// stream of frame headers and payload chunks.
///
/// Two driving styles are supported:
///
/// - exact reads: ask [`needed`](Self::needed) how many bytes to fetch, then
///   call [`feed_header`](Self::feed_header) / [`feed_payload`](Self::feed_payload);
/// - buffered: push arbitrary slices through [`feed`](Self::feed) and take
///   the message when it returns `Some`.
///
/// A zero-length *frame* is the in-band end-of-message sentinel. A
/// zero-byte *transport read* means the peer closed the connection; that is
/// the driver's concern and must surface as [`FrameError::ConnectionClosed`],
/// never as a sentinel.
#[derive(Debug)]
pub struct MessageAssembler {
    state: State,
    /// Unparsed input staged by `feed`.
    staging: BytesMut,
    /// Accumulated message payload.
    message: BytesMut,
    max_message_size: usize,
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageAssembler {
    /// Create an assembler with the default message-size ceiling.
    pub fn new() -> Self {
        Self::with_max_message_size(DEFAULT_MAX_MESSAGE)
    }

    /// Create an assembler with an explicit message-size ceiling.
    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self {
            state: State::AwaitingHeader,
            staging: BytesMut::new(),
            message: BytesMut::new(),
            max_message_size,
        }
    }

    /// Current state.
    pub fn state(&self) -> AssemblerState {
        match self.state {
            State::AwaitingHeader => AssemblerState::AwaitingHeader,
            State::AwaitingPayload { .. } => AssemblerState::AwaitingPayload,
            State::Complete => AssemblerState::Complete,
        }
    }

    /// True once the sentinel frame has been observed.
    pub fn is_complete(&self) -> bool {
        matches!(self.state, State::Complete)
    }

    /// True if no frame of the current message has been seen yet.
    ///
    /// Drivers use this to tell a clean disconnect (EOF between messages)
    /// from a connection dropped mid-message.
    pub fn is_empty(&self) -> bool {
        matches!(self.state, State::AwaitingHeader) && self.message.is_empty()
    }

    /// Number of bytes the assembler wants next: 4 for a header, the
    /// outstanding payload remainder, or 0 once complete.
    pub fn needed(&self) -> usize {
        match self.state {
            State::AwaitingHeader => HEADER_LEN,
            State::AwaitingPayload { remaining } => remaining,
            State::Complete => 0,
        }
    }

    /// Feed one frame header.
    ///
    /// A zero length is the sentinel and completes the message; any other
    /// length moves to `AwaitingPayload` expecting exactly that many bytes.
    pub fn feed_header(&mut self, header: [u8; HEADER_LEN]) -> Result<()> {
        debug_assert!(
            matches!(self.state, State::AwaitingHeader),
            "feed_header called outside AwaitingHeader"
        );

        let length = decode_header(&header)? as usize;
        if length == 0 {
            self.state = State::Complete;
            return Ok(());
        }

        let size = self.message.len() + length;
        if size > self.max_message_size {
            return Err(FrameError::MessageTooLarge {
                size,
                max: self.max_message_size,
            });
        }

        self.state = State::AwaitingPayload { remaining: length };
        Ok(())
    }

    /// Feed payload bytes for the current frame.
    ///
    /// Chunks smaller than the outstanding count are accepted (partial
    /// reads); once the frame is satisfied the assembler returns to
    /// `AwaitingHeader` for the next frame or the sentinel.
    pub fn feed_payload(&mut self, chunk: &[u8]) {
        let State::AwaitingPayload { remaining } = self.state else {
            debug_assert!(false, "feed_payload called outside AwaitingPayload");
            return;
        };
        debug_assert!(
            chunk.len() <= remaining,
            "payload chunk exceeds outstanding frame length"
        );

        self.message.extend_from_slice(chunk);
        let remaining = remaining - chunk.len();
        self.state = if remaining == 0 {
            State::AwaitingHeader
        } else {
            State::AwaitingPayload { remaining }
        };
    }

    /// Push an arbitrary slice of wire bytes through the state machine.
    ///
    /// Returns the completed message once the sentinel is observed; bytes
    /// beyond it stay staged until after [`reset`](Self::reset). Feeding
    /// while already complete only stages the input.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Option<Bytes>> {
        self.staging.extend_from_slice(chunk);

        loop {
            match self.state {
                State::AwaitingHeader => {
                    if self.staging.len() < HEADER_LEN {
                        return Ok(None);
                    }
                    let mut header = [0u8; HEADER_LEN];
                    header.copy_from_slice(&self.staging[..HEADER_LEN]);
                    self.staging.advance(HEADER_LEN);
                    self.feed_header(header)?;
                    if self.is_complete() {
                        return Ok(Some(self.message.split().freeze()));
                    }
                }
                State::AwaitingPayload { remaining } => {
                    if self.staging.is_empty() {
                        return Ok(None);
                    }
                    let take = remaining.min(self.staging.len());
                    let payload = self.staging.split_to(take);
                    self.feed_payload(&payload);
                }
                State::Complete => return Ok(None),
            }
        }
    }

    /// Take the completed message. Valid only in `Complete`.
    pub fn take(&mut self) -> Bytes {
        debug_assert!(self.is_complete(), "take called before message complete");
        self.message.split().freeze()
    }

    /// Clear the accumulation buffer and return to `AwaitingHeader`,
    /// ready for the next message. Called exactly once per completed
    /// message; staged input is preserved.
    pub fn reset(&mut self) {
        self.state = State::AwaitingHeader;
        self.message.clear();
    }
}
