//! Framed channel over one bidirectional byte stream.
//!
//! Wraps a TCP connection (or any `AsyncRead + AsyncWrite` stream) with the
//! role/size-header protocol. Reads go through a [`FrameBuffer`], so a
//! payload is only returned once exactly the declared number of bytes has
//! arrived, however the transport fragments them.
//!
//! # Example
//!
//! ```ignore
//! use bufferd::protocol::{FramedChannel, FrameTag, Role};
//!
//! let stream = tokio::net::TcpStream::connect("127.0.0.1:65432").await?;
//! let mut channel = FramedChannel::new(stream);
//! channel.identify(Role::Producer).await?;
//! channel.send_framed(FrameTag::Producer, b"<ITstudent>...</ITstudent>").await?;
//! ```

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::frame_buffer::FrameBuffer;
use super::wire_format::{FrameTag, Header, Role, DEFAULT_MAX_PAYLOAD_SIZE};
use super::Frame;
use crate::error::{BufferdError, Result};

/// Size of a single socket read.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// One connection's framed message channel.
pub struct FramedChannel<S> {
    stream: S,
    frames: FrameBuffer,
    read_buf: Box<[u8]>,
}

impl<S> FramedChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a stream with the default max payload size.
    pub fn new(stream: S) -> Self {
        Self::with_max_payload(stream, DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Wrap a stream with a custom max payload size.
    pub fn with_max_payload(stream: S, max_payload_size: usize) -> Self {
        Self {
            stream,
            frames: FrameBuffer::with_max_payload(max_payload_size),
            read_buf: vec![0u8; READ_CHUNK_SIZE].into_boxed_slice(),
        }
    }

    /// Send the role tag as the first message of a fresh connection.
    pub async fn identify(&mut self, role: Role) -> Result<()> {
        self.stream.write_all(role.tag().as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Wait for the role tag.
    ///
    /// # Errors
    ///
    /// `UnknownRole` as soon as the received bytes cannot be a known tag,
    /// or when the peer closes before a full tag arrives. The caller must
    /// close the connection without further I/O.
    pub async fn read_role(&mut self) -> Result<Role> {
        loop {
            if let Some(role) = self.frames.take_role()? {
                return Ok(role);
            }
            if self.fill().await? == 0 {
                let seen = String::from_utf8_lossy(self.frames.buffered()).into_owned();
                return Err(BufferdError::UnknownRole(seen));
            }
        }
    }

    /// Write a size header for `payload`, then exactly `payload.len()` bytes.
    pub async fn send_framed(&mut self, tag: FrameTag, payload: &[u8]) -> Result<()> {
        let header = Header::new(tag, payload.len()).encode(payload);
        self.stream.write_all(&header).await?;
        self.stream.write_all(payload).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read one size header and exactly the declared number of payload bytes.
    ///
    /// # Errors
    ///
    /// - `Protocol` / `PayloadTooLarge` for a malformed header
    /// - `Truncated` if the peer closes before the declared length arrived
    /// - `ConnectionClosed` if the peer closes before sending anything
    pub async fn recv_framed(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.frames.try_extract()? {
                return Ok(frame);
            }
            if self.fill().await? == 0 {
                return self.frames.finish();
            }
        }
    }

    /// Half-close the write side (sends FIN after flushing).
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Read until the peer closes, discarding anything it sends.
    ///
    /// Returns the number of bytes discarded.
    pub async fn wait_for_close(&mut self) -> Result<usize> {
        let mut discarded = 0;
        loop {
            let n = self.stream.read(&mut self.read_buf).await?;
            if n == 0 {
                return Ok(discarded);
            }
            discarded += n;
        }
    }

    /// Read one chunk into the frame buffer; returns 0 at end of stream.
    async fn fill(&mut self) -> Result<usize> {
        let n = self.stream.read(&mut self.read_buf).await?;
        self.frames.extend(&self.read_buf[..n]);
        Ok(n)
    }
}
