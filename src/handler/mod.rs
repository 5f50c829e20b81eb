//! Handler module - per-connection state machine and role flows.
//!
//! Every accepted connection walks:
//!
//! ```text
//! AwaitingRole ──► ProducerFlow ──┐
//!      │      └──► ConsumerFlow ──┼──► Closed
//!      └─────────► Rejected ──────┘
//! ```
//!
//! Provides:
//! - [`Connection`] - drives one connection through the states
//! - [`handle_producer`] / [`handle_consumer`] - the two role flows
//!
//! # Example
//!
//! ```ignore
//! use bufferd::handler::Connection;
//!
//! let mut conn = Connection::new(stream, queue, max_payload, shutdown.child_token());
//! match conn.run().await {
//!     Ok(role) => tracing::info!(%role, "connection finished"),
//!     Err(e) => tracing::warn!(error = %e, "connection aborted"),
//! }
//! ```

mod consumer;
mod producer;

pub use consumer::handle_consumer;
pub use producer::handle_producer;

use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::error::{BufferdError, Result};
use crate::protocol::{FramedChannel, Role};
use crate::queue::BoundedQueue;

/// Lifecycle state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the role tag.
    AwaitingRole,
    /// Receiving a payload to enqueue.
    ProducerFlow,
    /// Dequeuing a payload to send.
    ConsumerFlow,
    /// Role tag was not recognised.
    Rejected,
    /// Socket released.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::AwaitingRole => "awaiting_role",
            ConnectionState::ProducerFlow => "producer_flow",
            ConnectionState::ConsumerFlow => "consumer_flow",
            ConnectionState::Rejected => "rejected",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One accepted connection bound to the shared queue.
pub struct Connection<S> {
    channel: Option<FramedChannel<S>>,
    queue: Arc<BoundedQueue>,
    shutdown: CancellationToken,
    state: ConnectionState,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an accepted stream.
    pub fn new(
        stream: S,
        queue: Arc<BoundedQueue>,
        max_payload_size: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            channel: Some(FramedChannel::with_max_payload(stream, max_payload_size)),
            queue,
            shutdown,
            state: ConnectionState::AwaitingRole,
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Read the role, run its flow, then close the socket.
    ///
    /// Returns the role whose flow completed. Whatever happens, the
    /// connection ends in [`ConnectionState::Closed`] with the socket
    /// dropped.
    pub async fn run(&mut self) -> Result<Role> {
        let result = self.drive().await;
        self.channel = None;
        self.transition(ConnectionState::Closed);
        result
    }

    async fn drive(&mut self) -> Result<Role> {
        let Some(channel) = self.channel.as_mut() else {
            return Err(BufferdError::ConnectionClosed);
        };

        let role = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(BufferdError::Cancelled),
            role = channel.read_role() => role,
        };
        let role = match role {
            Ok(role) => role,
            Err(e) => {
                self.transition(ConnectionState::Rejected);
                return Err(e);
            }
        };

        tracing::info!(%role, "role resolved");
        self.transition(match role {
            Role::Producer => ConnectionState::ProducerFlow,
            Role::Consumer => ConnectionState::ConsumerFlow,
        });

        let Some(channel) = self.channel.as_mut() else {
            return Err(BufferdError::ConnectionClosed);
        };
        match role {
            Role::Producer => {
                handle_producer(channel, &self.queue, &self.shutdown).await?;
            }
            Role::Consumer => {
                handle_consumer(channel, &self.queue, &self.shutdown).await?;
            }
        }
        Ok(role)
    }

    fn transition(&mut self, next: ConnectionState) {
        tracing::debug!(from = %self.state, to = %next, "state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::protocol::{build_frame, FrameTag, DEFAULT_MAX_PAYLOAD_SIZE};

    fn connection<S>(stream: S, queue: &Arc<BoundedQueue>) -> Connection<S>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        Connection::new(
            stream,
            queue.clone(),
            DEFAULT_MAX_PAYLOAD_SIZE,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_producer_connection() {
        let (mut client, server) = duplex(256);
        let queue = Arc::new(BoundedQueue::new(4));
        let mut conn = connection(server, &queue);
        assert_eq!(conn.state(), ConnectionState::AwaitingRole);

        client.write_all(b"PRODUCER").await.unwrap();
        client
            .write_all(&build_frame(FrameTag::Producer, b"<p/>"))
            .await
            .unwrap();

        assert_eq!(conn.run().await.unwrap(), Role::Producer);
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(queue.dequeue().await.unwrap(), Bytes::from_static(b"<p/>"));
    }

    #[tokio::test]
    async fn test_consumer_connection() {
        let (mut client, server) = duplex(256);
        let queue = Arc::new(BoundedQueue::new(4));
        queue.enqueue(Bytes::from_static(b"<c/>")).await.unwrap();
        let mut conn = connection(server, &queue);

        client.write_all(b"CONSUMER").await.unwrap();
        assert_eq!(conn.run().await.unwrap(), Role::Consumer);

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"XML_DATA:4<c/>");
    }

    #[tokio::test]
    async fn test_unknown_role_closes_without_reply() {
        let (mut client, server) = duplex(256);
        let queue = Arc::new(BoundedQueue::new(4));
        let mut conn = connection(server, &queue);

        client.write_all(b"BOGUS").await.unwrap();
        let err = conn.run().await.unwrap_err();
        assert!(matches!(err, BufferdError::UnknownRole(_)));
        assert_eq!(conn.state(), ConnectionState::Closed);

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_while_awaiting_role() {
        let (_client, server) = duplex(256);
        let queue = Arc::new(BoundedQueue::new(4));
        let token = CancellationToken::new();
        let mut conn = Connection::new(server, queue, 1024, token.clone());

        token.cancel();
        assert!(matches!(conn.run().await, Err(BufferdError::Cancelled)));
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::AwaitingRole.to_string(), "awaiting_role");
        assert_eq!(ConnectionState::Rejected.to_string(), "rejected");
    }
}
