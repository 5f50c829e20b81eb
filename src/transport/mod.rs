//! Transport module - TCP socket handling.
//!
//! Provides:
//! - [`Listener`] - bound TCP listener used by the server's accept loop
//! - [`connect`] - client-side connection helper

mod tcp;

pub use tcp::{connect, Listener};
