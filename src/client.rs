//! Producer and consumer clients.
//!
//! Each call opens a fresh connection, performs exactly one exchange and
//! closes it:
//! 1. Connect and send the role tag
//! 2. Producer: send one framed payload, half-close, wait for the server to close
//! 3. Consumer: receive one `XML_DATA` frame
//!
//! # Example
//!
//! ```ignore
//! use bufferd::codec::XmlCodec;
//! use bufferd::{ConsumerClient, ProducerClient};
//!
//! let producer = ProducerClient::new("127.0.0.1:65432");
//! producer.send_record::<XmlCodec>(&record).await?;
//!
//! let consumer = ConsumerClient::new("127.0.0.1:65432");
//! let record = consumer.receive_record::<XmlCodec>().await?;
//! println!("{}", record);
//! ```

use bytes::Bytes;
use tokio::net::TcpStream;

use crate::codec::RecordCodec;
use crate::error::{BufferdError, Result};
use crate::protocol::{FrameTag, FramedChannel, Role, DEFAULT_MAX_PAYLOAD_SIZE};
use crate::record::Record;
use crate::transport::connect;

/// Submits payloads to a buffer server.
#[derive(Debug, Clone)]
pub struct ProducerClient {
    addr: String,
}

impl ProducerClient {
    /// Create a client for the server at `addr` (`host:port`).
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Server address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send one payload.
    ///
    /// Returns once the server has closed the connection. The server only
    /// closes after the payload is queued, so a full queue keeps this call
    /// waiting.
    pub async fn send(&self, payload: &[u8]) -> Result<()> {
        let mut channel = FramedChannel::new(connect(self.addr.as_str()).await?);
        channel.identify(Role::Producer).await?;
        channel.send_framed(FrameTag::Producer, payload).await?;
        channel.shutdown().await?;
        channel.wait_for_close().await?;
        tracing::debug!(addr = %self.addr, bytes = payload.len(), "payload sent");
        Ok(())
    }

    /// Encode `record` with `C` and send it.
    pub async fn send_record<C: RecordCodec>(&self, record: &Record) -> Result<()> {
        let payload = C::encode(record)?;
        self.send(&payload).await
    }
}

/// Takes payloads from a buffer server.
#[derive(Debug, Clone)]
pub struct ConsumerClient {
    addr: String,
    max_payload_size: usize,
}

impl ConsumerClient {
    /// Create a client for the server at `addr` (`host:port`).
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }

    /// Set the largest payload this client accepts.
    ///
    /// Default: 16 MiB
    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size;
        self
    }

    /// Server address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Receive one payload, waiting while the server's queue is empty.
    pub async fn receive(&self) -> Result<Bytes> {
        let stream: TcpStream = connect(self.addr.as_str()).await?;
        let mut channel = FramedChannel::with_max_payload(stream, self.max_payload_size);
        channel.identify(Role::Consumer).await?;

        let frame = channel.recv_framed().await?;
        if frame.tag() != FrameTag::XmlData {
            return Err(BufferdError::UnexpectedTag {
                expected: FrameTag::XmlData.as_str(),
                actual: frame.tag().as_str(),
            });
        }
        tracing::debug!(addr = %self.addr, bytes = frame.payload().len(), "payload received");
        Ok(frame.into_payload())
    }

    /// Receive one payload and decode it with `C`.
    pub async fn receive_record<C: RecordCodec>(&self) -> Result<Record> {
        let payload = self.receive().await?;
        C::decode(&payload)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::codec::XmlCodec;
    use crate::protocol::build_frame;
    use crate::transport::Listener;

    #[test]
    fn test_client_configuration() {
        let producer = ProducerClient::new("127.0.0.1:1");
        assert_eq!(producer.addr(), "127.0.0.1:1");

        let consumer = ConsumerClient::new("127.0.0.1:2").max_payload_size(64);
        assert_eq!(consumer.addr(), "127.0.0.1:2");
        assert_eq!(consumer.max_payload_size, 64);
    }

    #[tokio::test]
    async fn test_producer_wire_bytes() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let producer = ProducerClient::new(listener.local_addr().to_string());

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).await.unwrap();
            received
        });

        producer.send(b"<ITstudent/>").await.unwrap();
        assert_eq!(server.await.unwrap(), b"PRODUCERPRODUCER:12<ITstudent/>");
    }

    #[tokio::test]
    async fn test_consumer_decodes_record() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let consumer = ConsumerClient::new(listener.local_addr().to_string());

        let record = Record::new("Ann Lee", 12345678, "BSc IT", Default::default());
        let payload = XmlCodec::encode(&record).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut role = [0u8; 8];
            stream.read_exact(&mut role).await.unwrap();
            assert_eq!(&role, b"CONSUMER");
            stream
                .write_all(&build_frame(FrameTag::XmlData, &payload))
                .await
                .unwrap();
        });

        let received = consumer.receive_record::<XmlCodec>().await.unwrap();
        server.await.unwrap();
        assert_eq!(received, record);
    }

    #[tokio::test]
    async fn test_consumer_rejects_wrong_tag() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let consumer = ConsumerClient::new(listener.local_addr().to_string());

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut role = [0u8; 8];
            stream.read_exact(&mut role).await.unwrap();
            stream
                .write_all(&build_frame(FrameTag::Producer, b"<x/>"))
                .await
                .unwrap();
        });

        let err = consumer.receive().await.unwrap_err();
        server.await.unwrap();
        assert!(matches!(err, BufferdError::UnexpectedTag { .. }));
    }

    #[tokio::test]
    async fn test_consumer_reports_server_close() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let consumer = ConsumerClient::new(listener.local_addr().to_string());

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let err = consumer.receive().await.unwrap_err();
        server.await.unwrap();
        assert!(matches!(
            err,
            BufferdError::ConnectionClosed | BufferdError::Io(_)
        ));
    }
}
