//! TCP listener for the buffer server.
//!
//! # Example
//!
//! ```ignore
//! use bufferd::transport::Listener;
//!
//! let listener = Listener::bind("127.0.0.1:0").await?;
//! let (stream, peer) = listener.accept().await?;
//! ```

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::error::Result;

/// Listening socket that hands out connected streams.
#[derive(Debug)]
pub struct Listener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind to `addr`. Port 0 picks an ephemeral port; see [`local_addr`](Self::local_addr).
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept a single connection.
    ///
    /// Frames are written header-then-payload, so Nagle is disabled on the
    /// accepted stream.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self.listener.accept().await?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "failed to set TCP_NODELAY");
        }
        Ok((stream, peer))
    }

    /// Address the listener is bound to.
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Connect to a server, disabling Nagle like the accept side.
pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_accept_and_exchange() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr();

        let client = tokio::spawn(async move {
            let mut stream = connect(addr).await.unwrap();
            stream.write_all(b"ping").await.unwrap();
            stream.local_addr().unwrap()
        });

        let (mut stream, peer) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await.unwrap();

        assert_eq!(&buf, b"ping");
        assert_eq!(peer, client.await.unwrap());
        assert!(stream.nodelay().unwrap());
    }

    #[tokio::test]
    async fn test_bind_in_use_is_an_error() {
        let first = Listener::bind("127.0.0.1:0").await.unwrap();
        let result = Listener::bind(first.local_addr()).await;
        assert!(result.is_err());
    }
}
