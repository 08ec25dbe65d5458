//! Error handling for toolbridge.
//!
//! All fallible client operations return [`BridgeError`]. Its variants follow
//! the failure taxonomy of the client:
//!
//! | Variant | Raised when | Scope |
//! |---------|-------------|-------|
//! | [`BridgeError::Transport`] | the channel cannot be opened or written | connection setup / that send |
//! | [`BridgeError::Timeout`] | one request exceeded its deadline | that request |
//! | [`BridgeError::Protocol`] | the server answered with a JSON-RPC error | that request |
//! | [`BridgeError::SessionExpired`] | the HTTP session was invalidated | that request |
//! | [`BridgeError::UnsupportedMethod`] | the server lacks an optional method | discovery degrades |
//! | [`BridgeError::ToolExecution`] | a tool result carried `isError` | that call |
//!
//! Errors integrate with [`miette`] for diagnostic output.

pub mod codes;
mod details;
mod jsonrpc;
mod types;

pub use details::{
    BoxError, HandshakeDetails, ToolExecutionDetails, TransportDetails, TransportErrorKind,
};
pub use jsonrpc::JsonRpcError;
pub use types::BridgeError;

/// Result alias used throughout toolbridge.
pub type BridgeResult<T> = Result<T, BridgeError>;
