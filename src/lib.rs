//! # bufferd
//!
//! Bounded-buffer producer/consumer relay over TCP.
//!
//! Producers connect and hand over one encoded record each; consumers
//! connect and take one each. Between them the server keeps a
//! fixed-capacity FIFO queue: producers wait while it is full, consumers
//! wait while it is empty.
//!
//! ## Architecture
//!
//! - **Queue**: [`BoundedQueue`], a mutex-guarded list gated by two counting semaphores
//! - **Protocol**: role tag, then one `PRODUCER:<N>` or `XML_DATA:<N>` frame per connection
//! - **Server**: accept loop spawning one task per connection, graceful shutdown
//! - **Clients**: [`ProducerClient`] / [`ConsumerClient`] with pluggable record codecs
//!
//! ## Example
//!
//! ```ignore
//! use bufferd::codec::XmlCodec;
//! use bufferd::{ConsumerClient, ProducerClient, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::builder().bind_addr("127.0.0.1:0").bind().await?;
//!     let addr = server.local_addr().to_string();
//!     tokio::spawn(server.run());
//!
//!     let record = bufferd::record::generate(&mut rand::thread_rng());
//!     ProducerClient::new(&addr).send_record::<XmlCodec>(&record).await?;
//!     let received = ConsumerClient::new(&addr).receive_record::<XmlCodec>().await?;
//!     assert_eq!(received, record);
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod queue;
pub mod record;
pub mod transport;

mod client;
mod server;

pub use client::{ConsumerClient, ProducerClient};
pub use error::{BufferdError, ErrorClass, Result};
pub use queue::BoundedQueue;
pub use record::Record;
pub use server::{Server, ServerBuilder, ServerConfig, DEFAULT_BIND_ADDR, DEFAULT_SHUTDOWN_GRACE};
