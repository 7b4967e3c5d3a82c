//! Sentinel-terminated, length-prefixed message framing.
//!
//! Every message on the wire is a run of frames, each prefixed with a
//! 4-byte big-endian length, terminated by a zero-length sentinel frame:
//!
//! ```text
//! ┌───────────┬────────────┬───────────┬────────────┬───────────┐
//! │ Len (4B)  │ Payload    │ Len (4B)  │ Payload    │ 0x00000000 │
//! │ BE u32    │ Len bytes  │ BE u32    │ Len bytes  │ sentinel   │
//! └───────────┴────────────┴───────────┴────────────┴───────────┘
//! ```
//!
//! The sentinel carries no payload; a zero-byte *read from the transport*
//! is a different thing entirely (the peer hung up) and is surfaced by the
//! reader types as [`FrameError::ConnectionClosed`].

pub mod assembler;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use assembler::{AssemblerState, MessageAssembler};
pub use codec::{
    decode_header, encode_message, FrameConfig, DEFAULT_MAX_MESSAGE, HEADER_LEN, WRITE_FRAME_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::MessageReader;
pub use writer::MessageWriter;
