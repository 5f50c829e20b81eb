//! Frame struct - one size header plus its payload.
//!
//! Uses `bytes::Bytes` so the payload moves into the queue without copying.
//!
//! # Example
//!
//! ```
//! use bufferd::protocol::{Frame, FrameTag, Header};
//! use bytes::Bytes;
//!
//! let frame = Frame::new(Header::new(FrameTag::Producer, 5), Bytes::from_static(b"hello"));
//! assert_eq!(frame.tag(), FrameTag::Producer);
//! assert_eq!(frame.payload(), b"hello");
//! ```

use bytes::Bytes;

use super::wire_format::{FrameTag, Header};

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Exactly `header.payload_length` bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        debug_assert_eq!(header.payload_length, payload.len());
        Self { header, payload }
    }

    /// Get the frame tag.
    #[inline]
    pub fn tag(&self) -> FrameTag {
        self.header.tag
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take the payload, dropping the header.
    #[inline]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

/// Build the full wire bytes (header + payload) for a frame.
///
/// # Example
///
/// ```
/// use bufferd::protocol::{build_frame, FrameTag};
///
/// assert_eq!(build_frame(FrameTag::XmlData, b"<a/>"), b"XML_DATA:4<a/>".to_vec());
/// ```
pub fn build_frame(tag: FrameTag, payload: &[u8]) -> Vec<u8> {
    let header = Header::new(tag, payload.len());
    let mut buf = header.encode(payload);
    buf.extend_from_slice(payload);
    buf
}
