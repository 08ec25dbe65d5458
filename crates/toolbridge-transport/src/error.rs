//! Transport error types.

use thiserror::Error;
use toolbridge_core::error::{BridgeError, TransportDetails, TransportErrorKind};

/// Errors that can occur while opening, writing to, or closing a transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// I/O error from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The channel could not be established.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// The process host refused or failed an operation.
    #[error("Host process error: {message}")]
    Host {
        /// Error message.
        message: String,
    },

    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Transport is not connected.
    #[error("Not connected")]
    NotConnected,

    /// `connect` was called on an open transport.
    #[error("Transport already connected")]
    AlreadyConnected,

    /// The server answered with an unexpected HTTP status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// Status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The server no longer recognises the session id.
    #[error("Session expired: {session_id}")]
    SessionExpired {
        /// The session id that was cleared.
        session_id: String,
    },

    /// Message was too large.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Invalid message format.
    #[error("Invalid message: {message}")]
    InvalidMessage {
        /// Description of the problem.
        message: String,
    },
}

impl TransportError {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a host process error.
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
        }
    }

    /// Create an invalid message error.
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage {
            message: message.into(),
        }
    }

    /// Get the transport error kind.
    #[must_use]
    pub fn kind(&self) -> TransportErrorKind {
        match self {
            Self::Io(e) => match e.kind() {
                std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::NotConnected => TransportErrorKind::ConnectionFailed,
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe => {
                    TransportErrorKind::ConnectionClosed
                }
                std::io::ErrorKind::WriteZero => TransportErrorKind::WriteFailed,
                _ => TransportErrorKind::ReadFailed,
            },
            Self::Json(_) | Self::InvalidMessage { .. } => TransportErrorKind::InvalidMessage,
            Self::Connection { .. } => TransportErrorKind::ConnectionFailed,
            Self::Host { .. } => TransportErrorKind::HostProcess,
            Self::ConnectionClosed | Self::SessionExpired { .. } => {
                TransportErrorKind::ConnectionClosed
            }
            Self::NotConnected => TransportErrorKind::NotConnected,
            Self::AlreadyConnected => TransportErrorKind::AlreadyConnected,
            Self::Http { .. } => TransportErrorKind::HttpStatus,
            Self::MessageTooLarge { .. } => TransportErrorKind::MessageTooLarge,
        }
    }
}

impl From<TransportError> for BridgeError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::ConnectionClosed => Self::ConnectionClosed,
            TransportError::SessionExpired { session_id } => Self::SessionExpired { session_id },
            other => Self::Transport(Box::new(TransportDetails {
                kind: other.kind(),
                message: other.to_string(),
                source: Some(Box::new(other)),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            TransportError::host("spawn failed").kind(),
            TransportErrorKind::HostProcess
        );
        assert_eq!(
            TransportError::Http {
                status: 500,
                body: String::new(),
            }
            .kind(),
            TransportErrorKind::HttpStatus
        );
        assert_eq!(
            TransportError::invalid_message("bad").kind(),
            TransportErrorKind::InvalidMessage
        );
    }

    #[test]
    fn test_bridge_error_conversion() {
        let err: BridgeError = TransportError::ConnectionClosed.into();
        assert!(matches!(err, BridgeError::ConnectionClosed));

        let err: BridgeError = TransportError::SessionExpired {
            session_id: "abc".to_string(),
        }
        .into();
        assert!(matches!(err, BridgeError::SessionExpired { ref session_id } if session_id == "abc"));

        let err: BridgeError = TransportError::NotConnected.into();
        match err {
            BridgeError::Transport(details) => {
                assert_eq!(details.kind, TransportErrorKind::NotConnected);
                assert_eq!(details.message, "Not connected");
            }
            other => panic!("Expected Transport error, got {other:?}"),
        }
    }
}
