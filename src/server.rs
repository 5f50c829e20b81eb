//! Server builder and accept loop.
//!
//! The [`ServerBuilder`] provides a fluent API for configuring the server.
//! The [`Server`] owns the listener and the shared queue and manages the
//! lifecycle:
//! 1. Bind the listener
//! 2. Accept connections, spawning one task per connection
//! 3. On shutdown, stop accepting, release blocked handlers, drain tasks
//!
//! # Example
//!
//! ```ignore
//! use bufferd::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::builder()
//!         .bind_addr("127.0.0.1:65432")
//!         .capacity(10)
//!         .bind()
//!         .await?;
//!
//!     server
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::{BufferdError, ErrorClass, Result};
use crate::handler::Connection;
use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;
use crate::queue::{BoundedQueue, DEFAULT_CAPACITY, MAX_CAPACITY};
use crate::transport::Listener;

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:65432";

/// Default time connection tasks get to finish after shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Pause after a failed accept (e.g. out of file descriptors).
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (`host:port`).
    pub bind_addr: String,
    /// Queue capacity.
    pub capacity: usize,
    /// Largest payload a producer may declare.
    pub max_payload_size: usize,
    /// How long connection tasks may run on after shutdown starts.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            capacity: DEFAULT_CAPACITY,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Builder for configuring and binding a [`Server`].
pub struct ServerBuilder {
    config: ServerConfig,
    queue: Option<Arc<BoundedQueue>>,
}

impl ServerBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            queue: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the listen address.
    ///
    /// Default: `127.0.0.1:65432`
    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    /// Set the queue capacity. Ignored when a queue is injected.
    ///
    /// Default: 10
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Set the maximum declared payload size.
    ///
    /// Default: 16 MiB
    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.config.max_payload_size = size;
        self
    }

    /// Set the shutdown grace period.
    ///
    /// Default: 5 seconds
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// Serve an externally constructed queue instead of creating one.
    pub fn queue(mut self, queue: Arc<BoundedQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Validate the configuration and bind the listener.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a zero or oversized capacity, `Io` if the
    /// address cannot be bound.
    pub async fn bind(self) -> Result<Server> {
        let queue = match self.queue {
            Some(queue) => queue,
            None => {
                validate_capacity(self.config.capacity)?;
                Arc::new(BoundedQueue::new(self.config.capacity))
            }
        };
        validate_capacity(queue.capacity())?;

        let listener = Listener::bind(self.config.bind_addr.as_str()).await?;

        let mut config = self.config;
        config.capacity = queue.capacity();

        Ok(Server {
            listener,
            queue,
            config,
            shutdown: CancellationToken::new(),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_capacity(capacity: usize) -> Result<()> {
    if capacity == 0 {
        return Err(BufferdError::InvalidConfig(
            "queue capacity must be at least 1".to_string(),
        ));
    }
    if capacity > MAX_CAPACITY {
        return Err(BufferdError::InvalidConfig(format!(
            "queue capacity {} exceeds maximum {}",
            capacity, MAX_CAPACITY
        )));
    }
    Ok(())
}

/// A bound buffer server.
///
/// Use `run()` or `run_until()` to start accepting connections.
pub struct Server {
    listener: Listener,
    queue: Arc<BoundedQueue>,
    config: ServerConfig,
    shutdown: CancellationToken,
}

impl Server {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Address the listener is bound to.
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// The shared queue.
    #[inline]
    pub fn queue(&self) -> &Arc<BoundedQueue> {
        &self.queue
    }

    /// Effective configuration.
    #[inline]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accept connections until the shutdown token is cancelled.
    pub async fn run(self) -> Result<()> {
        let token = self.shutdown.clone();
        self.run_until(async move { token.cancelled().await }).await
    }

    /// Accept connections until `signal` resolves (or the shutdown token
    /// is cancelled), then shut down gracefully.
    ///
    /// Shutdown cancels the token, closes the queue so every blocked
    /// handler returns, and waits up to `shutdown_grace` for connection
    /// tasks before aborting the rest. Payloads still queued are dropped.
    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(signal);

        tracing::info!(
            addr = %self.local_addr(),
            capacity = self.queue.capacity(),
            max_payload = self.config.max_payload_size,
            "listening"
        );

        let mut tasks = JoinSet::new();
        let mut next_id: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = &mut signal => break,
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        next_id += 1;
                        self.spawn_connection(&mut tasks, stream, peer, next_id);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }

            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "connection task failed");
                }
            }
        }

        self.drain(tasks).await;
        Ok(())
    }

    fn spawn_connection(
        &self,
        tasks: &mut JoinSet<()>,
        stream: TcpStream,
        peer: SocketAddr,
        id: u64,
    ) {
        let queue = self.queue.clone();
        let max_payload_size = self.config.max_payload_size;
        let shutdown = self.shutdown.child_token();
        let span = tracing::info_span!("connection", %peer, id);

        tasks.spawn(
            async move {
                tracing::info!("accepted");
                let mut conn = Connection::new(stream, queue, max_payload_size, shutdown);
                match conn.run().await {
                    Ok(role) => tracing::info!(%role, "completed"),
                    Err(e) => match e.class() {
                        ErrorClass::Shutdown => tracing::debug!(error = %e, "released by shutdown"),
                        class => tracing::warn!(%class, error = %e, "aborted"),
                    },
                }
            }
            .instrument(span),
        );
    }

    async fn drain(&self, mut tasks: JoinSet<()>) {
        tracing::info!(
            connections = tasks.len(),
            depth = self.queue.len(),
            "shutting down"
        );
        self.shutdown.cancel();
        self.queue.close();

        let finished = tokio::time::timeout(self.config.shutdown_grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if finished.is_err() {
            tracing::warn!(
                remaining = tasks.len(),
                "grace period elapsed, aborting connections"
            );
            tasks.shutdown().await;
        }
        tracing::info!("stopped");
    }
}
