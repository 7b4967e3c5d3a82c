use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: one big-endian u32 length.
pub const HEADER_LEN: usize = 4;

/// Data frame size used when encoding. Payloads larger than this are split
/// across multiple frames before the sentinel.
pub const WRITE_FRAME_SIZE: usize = 8 * 1024;

/// Default maximum assembled message size: 16 MiB.
pub const DEFAULT_MAX_MESSAGE: usize = 16 * 1024 * 1024;

/// Encode a payload as a framed message: zero or more data frames followed
/// by the mandatory zero-length sentinel frame.
///
/// An empty payload encodes as a bare sentinel.
pub fn encode_message(payload: &[u8], dst: &mut BytesMut) {
    let frames = payload.len().div_ceil(WRITE_FRAME_SIZE);
    dst.reserve(payload.len() + (frames + 1) * HEADER_LEN);

    for chunk in payload.chunks(WRITE_FRAME_SIZE) {
        dst.put_u32(chunk.len() as u32);
        dst.put_slice(chunk);
    }
    dst.put_u32(0); // sentinel
}

/// Decode a frame header into its payload length.
///
/// Pure function: the caller is responsible for supplying exactly
/// [`HEADER_LEN`] bytes; anything else is a [`FrameError::MalformedFrame`].
pub fn decode_header(header: &[u8]) -> Result<u32> {
    let bytes: [u8; HEADER_LEN] =
        header
            .try_into()
            .map_err(|_| FrameError::MalformedFrame {
                expected: HEADER_LEN,
                actual: header.len(),
            })?;
    Ok(u32::from_be_bytes(bytes))
}

/// Configuration for message framing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum assembled message size in bytes. Default: 16 MiB.
    pub max_message_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
