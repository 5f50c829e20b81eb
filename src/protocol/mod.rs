//! Protocol module - wire format, framing, and the framed channel.
//!
//! This module implements the per-connection protocol:
//! - role tags and text size headers
//! - frame buffer for accumulating partial reads
//! - async channel reading/writing whole frames over a stream

mod channel;
mod frame;
mod frame_buffer;
mod wire_format;

pub use channel::{FramedChannel, READ_CHUNK_SIZE};
pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    needs_terminator, FrameTag, Header, HeaderParse, Role, RoleMatch, DEFAULT_MAX_PAYLOAD_SIZE,
    HEADER_SEPARATOR, HEADER_TERMINATOR, MAX_LENGTH_DIGITS, MAX_TAG_LEN,
};
