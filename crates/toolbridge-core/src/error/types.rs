//! The error type shared by every toolbridge crate.

use std::time::Duration;

use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

use super::codes;
use super::details::{
    BoxError, HandshakeDetails, ToolExecutionDetails, TransportDetails, TransportErrorKind,
};
use super::jsonrpc::JsonRpcError;

/// Errors surfaced by the tool-server client.
///
/// Per-request failures ([`Timeout`](Self::Timeout), [`Protocol`](Self::Protocol),
/// [`ToolExecution`](Self::ToolExecution)) only ever reject the call that
/// caused them. Transport and handshake failures abort connection setup.
/// Nothing here is retried automatically.
///
/// Large variants are boxed to keep `Result<T, BridgeError>` small.
#[derive(Error, Diagnostic, Debug)]
pub enum BridgeError {
    // ========================================================================
    // Transport
    // ========================================================================
    /// The channel to the server could not be opened or written.
    #[error("Transport error ({}): {}", .0.kind, .0.message)]
    #[diagnostic(code(toolbridge::transport))]
    Transport(#[source] Box<TransportDetails>),

    /// The connection closed while the operation was outstanding.
    #[error("Connection closed")]
    #[diagnostic(
        code(toolbridge::connection::closed),
        help("Reconnect the client before issuing further requests")
    )]
    ConnectionClosed,

    /// The HTTP session was invalidated by the server.
    #[error("Session expired: {session_id}")]
    #[diagnostic(
        code(toolbridge::session::expired),
        help("The session id was cleared; reconnect to obtain a fresh session")
    )]
    SessionExpired {
        /// The session id the server no longer recognises.
        session_id: String,
    },

    // ========================================================================
    // Per-request failures
    // ========================================================================
    /// A single request exceeded its deadline.
    #[error("Request '{method}' (id {id}) timed out after {duration:?}")]
    #[diagnostic(
        code(toolbridge::timeout),
        help("Consider raising the request timeout for slow tools")
    )]
    Timeout {
        /// Method of the request that timed out.
        method: String,
        /// Id of the request that timed out.
        id: String,
        /// The deadline that elapsed.
        duration: Duration,
    },

    /// The server answered with a JSON-RPC error object.
    #[error("Server error {code} on '{method}': {message}")]
    #[diagnostic(code(toolbridge::protocol))]
    Protocol {
        /// Method the error answered.
        method: String,
        /// The server's error code.
        code: i32,
        /// The server's error message.
        message: String,
        /// The server's structured payload, if any.
        data: Option<Value>,
    },

    /// The server answered `-32601` (method not found).
    #[error("Server does not support '{method}': {message}")]
    #[diagnostic(code(toolbridge::unsupported_method))]
    UnsupportedMethod {
        /// The method that was rejected.
        method: String,
        /// The server's message.
        message: String,
        /// The server's structured payload, if any.
        data: Option<Value>,
    },

    /// A tool ran and reported failure through `isError`.
    #[error("Tool '{}' failed: {}", .0.tool, .0.message)]
    #[diagnostic(code(toolbridge::tool::execution))]
    ToolExecution(#[source] Box<ToolExecutionDetails>),

    /// The named tool is absent from the discovered catalog.
    #[error("Unknown tool: {name}")]
    #[diagnostic(
        code(toolbridge::tool::unknown),
        help("Refresh the tool list; the server may have removed it")
    )]
    UnknownTool {
        /// The requested tool name.
        name: String,
    },

    /// A response payload did not match the expected shape.
    #[error("Invalid response to '{method}': {message}")]
    #[diagnostic(code(toolbridge::protocol::invalid_response))]
    InvalidResponse {
        /// The method whose result failed to decode.
        method: String,
        /// What was wrong with it.
        message: String,
        /// The decode error, if available.
        #[source]
        source: Option<BoxError>,
    },

    /// Request parameters could not be serialized.
    #[error("Serialization failed: {0}")]
    #[diagnostic(code(toolbridge::serialization))]
    Serialization(#[from] serde_json::Error),

    // ========================================================================
    // Lifecycle
    // ========================================================================
    /// The handshake was rejected or produced an unusable answer.
    #[error("Handshake failed: {}", .0.message)]
    #[diagnostic(code(toolbridge::handshake))]
    HandshakeFailed(#[source] Box<HandshakeDetails>),

    /// `connect` was called while a connection is live.
    #[error("Client is already connected")]
    #[diagnostic(code(toolbridge::lifecycle::already_connected))]
    AlreadyConnected,

    /// The client is in a state that does not permit the operation.
    #[error("Cannot {operation} while {state}")]
    #[diagnostic(
        code(toolbridge::lifecycle::invalid_state),
        help("Call disconnect() to release a failed connection before reconnecting")
    )]
    InvalidState {
        /// What was attempted.
        operation: String,
        /// The state the client was in.
        state: String,
    },

    /// The operation needs a ready connection.
    #[error("Client is not ready (state: {state})")]
    #[diagnostic(code(toolbridge::lifecycle::not_ready))]
    NotReady {
        /// The state the client was in.
        state: String,
    },
}

// ============================================================================
// Construction Helpers
// ============================================================================

impl BridgeError {
    /// Create a transport error.
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self::Transport(Box::new(TransportDetails {
            kind,
            message: message.into(),
            source: None,
        }))
    }

    /// Create a transport error wrapping its cause.
    pub fn transport_with_source<E: std::error::Error + Send + Sync + 'static>(
        kind: TransportErrorKind,
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Transport(Box::new(TransportDetails {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }))
    }

    /// Map a JSON-RPC error answering `method` onto the taxonomy.
    ///
    /// `-32601` becomes [`UnsupportedMethod`](Self::UnsupportedMethod); every
    /// other code is preserved in [`Protocol`](Self::Protocol). The server's
    /// message and data are kept either way.
    pub fn from_rpc(method: impl Into<String>, error: JsonRpcError) -> Self {
        let method = method.into();
        if error.code == codes::METHOD_NOT_FOUND {
            return Self::UnsupportedMethod {
                method,
                message: error.message,
                data: error.data,
            };
        }
        Self::Protocol {
            method,
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }

    /// Create a timeout error.
    pub fn timeout(method: impl Into<String>, id: impl ToString, duration: Duration) -> Self {
        Self::Timeout {
            method: method.into(),
            id: id.to_string(),
            duration,
        }
    }

    /// Create a tool execution error.
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>, output: Value) -> Self {
        Self::ToolExecution(Box::new(ToolExecutionDetails {
            tool: tool.into(),
            message: message.into(),
            output,
        }))
    }

    /// Create a handshake failure.
    pub fn handshake_failed(message: impl Into<String>) -> Self {
        Self::HandshakeFailed(Box::new(HandshakeDetails {
            message: message.into(),
            client_version: None,
            server_version: None,
            source: None,
        }))
    }

    /// Create a handshake failure caused by a version mismatch.
    pub fn handshake_version_mismatch(
        client_version: impl Into<String>,
        server_version: impl Into<String>,
    ) -> Self {
        let client_version = client_version.into();
        let server_version = server_version.into();
        Self::HandshakeFailed(Box::new(HandshakeDetails {
            message: format!(
                "server answered with unsupported protocol version {server_version} (requested {client_version})"
            ),
            client_version: Some(client_version),
            server_version: Some(server_version),
            source: None,
        }))
    }

    /// Wrap an error raised during the handshake.
    pub fn handshake_with_source(message: impl Into<String>, source: BridgeError) -> Self {
        Self::HandshakeFailed(Box::new(HandshakeDetails {
            message: message.into(),
            client_version: None,
            server_version: None,
            source: Some(Box::new(source)),
        }))
    }

    /// Create an invalid-response error.
    pub fn invalid_response(method: impl Into<String>, source: serde_json::Error) -> Self {
        Self::InvalidResponse {
            method: method.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid-state error.
    pub fn invalid_state(operation: impl Into<String>, state: impl ToString) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            state: state.to_string(),
        }
    }

    /// Create a not-ready error.
    pub fn not_ready(state: impl ToString) -> Self {
        Self::NotReady {
            state: state.to_string(),
        }
    }

    /// JSON-RPC style code for this error.
    ///
    /// Server-originated errors keep the server's code.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Protocol { code, .. } => *code,
            Self::UnsupportedMethod { .. } => codes::METHOD_NOT_FOUND,
            Self::InvalidResponse { .. } | Self::Serialization(_) => codes::INTERNAL_ERROR,
            Self::Transport(_) => codes::SERVER_ERROR_START,
            Self::ToolExecution(_) => codes::SERVER_ERROR_START - 1,
            Self::ConnectionClosed => codes::SERVER_ERROR_START - 3,
            Self::SessionExpired { .. } => codes::SERVER_ERROR_START - 4,
            Self::HandshakeFailed(_) => codes::SERVER_ERROR_START - 5,
            Self::Timeout { .. } => codes::SERVER_ERROR_START - 7,
            Self::UnknownTool { .. } => codes::INVALID_PARAMS,
            Self::AlreadyConnected | Self::InvalidState { .. } | Self::NotReady { .. } => {
                codes::INVALID_REQUEST
            }
        }
    }

    /// Whether the calling layer may reasonably retry.
    ///
    /// Nothing in this crate acts on this; it is advice for orchestration
    /// code above the client.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::SessionExpired { .. } | Self::ToolExecution(_)
        )
    }

    /// Whether this error means the server lacks the method.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedMethod { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_rpc_maps_method_not_found() {
        let err = BridgeError::from_rpc("resources/list", JsonRpcError::method_not_found("x"));
        assert!(err.is_unsupported());
        assert_eq!(err.code(), codes::METHOD_NOT_FOUND);
    }

    #[test]
    fn test_from_rpc_method_not_found_keeps_server_message() {
        let rpc = JsonRpcError::new(codes::METHOD_NOT_FOUND, "Tool 'rm' disabled by policy")
            .with_data(json!({"tool": "rm"}));
        let err = BridgeError::from_rpc("tools/call", rpc);
        match &err {
            BridgeError::UnsupportedMethod {
                method,
                message,
                data,
            } => {
                assert_eq!(method, "tools/call");
                assert_eq!(message, "Tool 'rm' disabled by policy");
                assert_eq!(data.as_ref(), Some(&json!({"tool": "rm"})));
            }
            other => panic!("expected unsupported method, got {other:?}"),
        }
        assert_eq!(err.code(), codes::METHOD_NOT_FOUND);
        assert!(err.to_string().contains("Tool 'rm' disabled by policy"));
    }

    #[test]
    fn test_from_rpc_preserves_server_code() {
        let rpc = JsonRpcError::new(-32042, "quota exhausted").with_data(json!({"retry": 5}));
        let err = BridgeError::from_rpc("tools/call", rpc);
        match &err {
            BridgeError::Protocol {
                method,
                code,
                message,
                data,
            } => {
                assert_eq!(method, "tools/call");
                assert_eq!(*code, -32042);
                assert_eq!(message, "quota exhausted");
                assert_eq!(data.as_ref(), Some(&json!({"retry": 5})));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(err.code(), -32042);
    }

    #[test]
    fn test_display_messages() {
        let err = BridgeError::timeout("tools/call", 4u64, Duration::from_secs(30));
        assert_eq!(
            err.to_string(),
            "Request 'tools/call' (id 4) timed out after 30s"
        );

        let err = BridgeError::tool_failed("fail", "boom", json!("boom"));
        assert_eq!(err.to_string(), "Tool 'fail' failed: boom");

        let err = BridgeError::transport(TransportErrorKind::HostProcess, "spawn failed");
        assert!(err.to_string().contains("host process"));
    }

    #[test]
    fn test_recoverability() {
        assert!(
            BridgeError::SessionExpired {
                session_id: "abc".into()
            }
            .is_recoverable()
        );
        assert!(!BridgeError::ConnectionClosed.is_recoverable());
        assert!(!BridgeError::AlreadyConnected.is_recoverable());
    }

    #[test]
    fn test_handshake_version_mismatch_keeps_versions() {
        let err = BridgeError::handshake_version_mismatch("2025-06-18", "1999-01-01");
        let BridgeError::HandshakeFailed(details) = err else {
            panic!("expected handshake failure");
        };
        assert_eq!(details.server_version.as_deref(), Some("1999-01-01"));
        assert!(details.message.contains("1999-01-01"));
    }
}
