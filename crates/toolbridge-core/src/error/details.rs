//! Boxed payloads for the larger [`BridgeError`](super::BridgeError) variants.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Boxed error that is `Send + Sync`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classification of transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// The channel could not be opened.
    ConnectionFailed,
    /// The channel closed underneath an operation.
    ConnectionClosed,
    /// The host runtime could not spawn or address the server process.
    HostProcess,
    /// Writing a frame failed.
    WriteFailed,
    /// Reading a frame failed.
    ReadFailed,
    /// The server answered with an unexpected HTTP status.
    HttpStatus,
    /// A frame could not be encoded or decoded.
    InvalidMessage,
    /// A frame exceeded the configured size limit.
    MessageTooLarge,
    /// The transport was used before `connect`.
    NotConnected,
    /// `connect` was called on an open transport.
    AlreadyConnected,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ConnectionFailed => "connection failed",
            Self::ConnectionClosed => "connection closed",
            Self::HostProcess => "host process",
            Self::WriteFailed => "write failed",
            Self::ReadFailed => "read failed",
            Self::HttpStatus => "http status",
            Self::InvalidMessage => "invalid message",
            Self::MessageTooLarge => "message too large",
            Self::NotConnected => "not connected",
            Self::AlreadyConnected => "already connected",
        };
        f.write_str(label)
    }
}

/// Details for transport errors.
#[derive(Debug)]
pub struct TransportDetails {
    /// What went wrong.
    pub kind: TransportErrorKind,
    /// Human-readable message.
    pub message: String,
    /// The underlying error, if available.
    pub source: Option<BoxError>,
}

impl fmt::Display for TransportDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TransportDetails {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Details for a tool call whose result carried `isError: true`.
#[derive(Debug)]
pub struct ToolExecutionDetails {
    /// Name of the tool that reported failure.
    pub tool: String,
    /// Text summary of the failure content.
    pub message: String,
    /// The flattened result content, as the tool returned it.
    pub output: Value,
}

impl fmt::Display for ToolExecutionDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tool '{}' failed: {}", self.tool, self.message)
    }
}

impl std::error::Error for ToolExecutionDetails {}

/// Details for a failed handshake.
#[derive(Debug)]
pub struct HandshakeDetails {
    /// Human-readable message.
    pub message: String,
    /// Protocol version the client asked for.
    pub client_version: Option<String>,
    /// Protocol version the server answered with.
    pub server_version: Option<String>,
    /// The underlying error, if available.
    pub source: Option<BoxError>,
}

impl fmt::Display for HandshakeDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handshake failed: {}", self.message)
    }
}

impl std::error::Error for HandshakeDetails {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}
