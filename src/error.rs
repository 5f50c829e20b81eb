//! Error types for bufferd.

use std::fmt;

use thiserror::Error;

/// Main error type for all bufferd operations.
#[derive(Debug, Error)]
pub enum BufferdError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// First message on a connection matched neither role tag.
    #[error("Unknown role: {0:?}")]
    UnknownRole(String),

    /// Malformed size header or other framing violation.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Declared payload length exceeds the configured maximum.
    #[error("Payload size {declared} exceeds maximum {max}")]
    PayloadTooLarge { declared: u64, max: usize },

    /// Peer closed the connection before the declared length arrived.
    #[error("Truncated payload: expected {expected} bytes, received {received}")]
    Truncated { expected: usize, received: usize },

    /// Frame carried a different tag than the flow expects.
    #[error("Unexpected frame tag: expected {expected}, got {actual}")]
    UnexpectedTag {
        expected: &'static str,
        actual: &'static str,
    },

    /// Connection closed before any frame started.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Invalid server or client configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// XML encode/decode failure.
    #[error("XML error: {0}")]
    Xml(String),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Payload parsed but does not describe a valid record.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Queue was closed while waiting (server shutdown).
    #[error("Queue closed")]
    QueueClosed,

    /// Wait abandoned because the cancellation token fired.
    #[error("Cancelled")]
    Cancelled,
}

/// Coarse classification used in log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed role tag, size header or truncated payload.
    Protocol,
    /// Payload bytes do not decode into a record.
    Decode,
    /// Peer disconnect or socket failure.
    Transport,
    /// Server shutting down or wait cancelled.
    Shutdown,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClass::Protocol => "protocol",
            ErrorClass::Decode => "decode",
            ErrorClass::Transport => "transport",
            ErrorClass::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

impl BufferdError {
    /// Map this error onto its failure class.
    pub fn class(&self) -> ErrorClass {
        match self {
            BufferdError::UnknownRole(_)
            | BufferdError::Protocol(_)
            | BufferdError::PayloadTooLarge { .. }
            | BufferdError::Truncated { .. }
            | BufferdError::UnexpectedTag { .. }
            | BufferdError::InvalidConfig(_) => ErrorClass::Protocol,
            BufferdError::Xml(_)
            | BufferdError::MsgPackEncode(_)
            | BufferdError::MsgPackDecode(_)
            | BufferdError::InvalidRecord(_) => ErrorClass::Decode,
            BufferdError::Io(_) | BufferdError::ConnectionClosed => ErrorClass::Transport,
            BufferdError::QueueClosed | BufferdError::Cancelled => ErrorClass::Shutdown,
        }
    }
}

/// Result type alias using BufferdError.
pub type Result<T> = std::result::Result<T, BufferdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_is_protocol_class() {
        let err = BufferdError::Truncated {
            expected: 500,
            received: 300,
        };
        assert_eq!(err.class(), ErrorClass::Protocol);
        assert!(err.to_string().contains("expected 500"));
    }

    #[test]
    fn test_io_is_transport_class() {
        let err = BufferdError::from(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert_eq!(err.class(), ErrorClass::Transport);
    }

    #[test]
    fn test_shutdown_classes() {
        assert_eq!(BufferdError::QueueClosed.class(), ErrorClass::Shutdown);
        assert_eq!(BufferdError::Cancelled.class(), ErrorClass::Shutdown);
        assert_eq!(ErrorClass::Shutdown.to_string(), "shutdown");
    }

    #[test]
    fn test_unknown_role_display() {
        let err = BufferdError::UnknownRole("BOGUS".to_string());
        assert_eq!(err.to_string(), "Unknown role: \"BOGUS\"");
    }
}
