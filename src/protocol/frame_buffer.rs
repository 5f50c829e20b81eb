//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented input:
//! - `WaitingForHeader`: size header not yet terminated
//! - `WaitingForPayload`: header parsed, need N more payload bytes
//!
//! Before the first header, [`FrameBuffer::take_role`] consumes the role
//! tag from the same buffer, so bytes that arrive coalesced with the tag
//! are kept for the header.
//!
//! # Example
//!
//! ```
//! use bufferd::protocol::{FrameBuffer, Role};
//!
//! let mut buffer = FrameBuffer::new();
//! buffer.extend(b"PRODUCERPRODUCER:3<a>");
//!
//! assert_eq!(buffer.take_role().unwrap(), Some(Role::Producer));
//! let frame = buffer.try_extract().unwrap().unwrap();
//! assert_eq!(frame.payload(), b"<a>");
//! ```

use bytes::{Bytes, BytesMut};

use super::wire_format::{Header, HeaderParse, Role, RoleMatch, DEFAULT_MAX_PAYLOAD_SIZE};
use super::Frame;
use crate::error::{BufferdError, Result};

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for a complete size header.
    WaitingForHeader,
    /// Header parsed, waiting for payload bytes.
    WaitingForPayload { header: Header },
}

/// Buffer for accumulating incoming bytes and extracting a complete frame.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed payload size.
    max_payload_size: usize,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 8KB, max payload: 16MB.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a new frame buffer with custom max payload size.
    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            state: State::WaitingForHeader,
            max_payload_size,
        }
    }

    /// Append data to the buffer without extracting anything.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Consume the role tag from the front of the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(role))` once a full tag is buffered
    /// - `Ok(None)` if the bytes so far are a prefix of a tag
    /// - `Err(UnknownRole)` as soon as the bytes cannot become a tag
    pub fn take_role(&mut self) -> Result<Option<Role>> {
        match Role::match_prefix(&self.buffer) {
            RoleMatch::Complete(role) => {
                let _ = self.buffer.split_to(role.tag().len());
                Ok(Some(role))
            }
            RoleMatch::Partial => Ok(None),
            RoleMatch::Invalid => Err(BufferdError::UnknownRole(
                String::from_utf8_lossy(&self.buffer).into_owned(),
            )),
        }
    }

    /// Push data into the buffer and try to extract the frame.
    ///
    /// Returns `Ok(None)` while more data is needed.
    pub fn push(&mut self, data: &[u8]) -> Result<Option<Frame>> {
        self.extend(data);
        self.try_extract()
    }

    /// Try to extract a single frame from the buffered bytes.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` if a complete frame was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` on protocol violation (bad header, payload too large)
    pub fn try_extract(&mut self) -> Result<Option<Frame>> {
        self.extract(false)
    }

    /// Signal end of input and extract the frame if it is complete.
    ///
    /// A header whose digit run reaches end of input completes here.
    ///
    /// # Errors
    ///
    /// - `ConnectionClosed` if nothing at all was buffered
    /// - `Truncated` if fewer payload bytes arrived than declared
    pub fn finish(&mut self) -> Result<Frame> {
        match self.extract(true)? {
            Some(frame) => Ok(frame),
            None => match &self.state {
                State::WaitingForPayload { header } => Err(BufferdError::Truncated {
                    expected: header.payload_length,
                    received: self.buffer.len(),
                }),
                State::WaitingForHeader => Err(BufferdError::ConnectionClosed),
            },
        }
    }

    fn extract(&mut self, at_eof: bool) -> Result<Option<Frame>> {
        if let State::WaitingForHeader = self.state {
            match Header::parse(&self.buffer, self.max_payload_size, at_eof)? {
                HeaderParse::Incomplete => return Ok(None),
                HeaderParse::Complete { header, consumed } => {
                    let _ = self.buffer.split_to(consumed);
                    self.state = State::WaitingForPayload { header };
                }
            }
        }

        match self.state {
            State::WaitingForPayload { header } => {
                let remaining = header.payload_length;
                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                let payload: Bytes = self.buffer.split_to(remaining).freeze();
                self.state = State::WaitingForHeader;
                Ok(Some(Frame::new(header, payload)))
            }
            State::WaitingForHeader => Ok(None),
        }
    }

    /// Bytes buffered but not yet consumed.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
