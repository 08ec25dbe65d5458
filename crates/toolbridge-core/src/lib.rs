//! # toolbridge-core
//!
//! Wire-level building blocks for talking to tool servers:
//!
//! - **Envelope**: JSON-RPC 2.0 request/response/notification types
//! - **Handshake**: client and server capabilities, identities, versions
//! - **Payloads**: tools, resources, templates and result content parts
//! - **Errors**: the unified [`BridgeError`] with [`miette`] diagnostics
//!
//! This crate has no async runtime dependency.
//!
//! # Example
//!
//! ```rust
//! use toolbridge_core::types::CallToolResult;
//!
//! let result: CallToolResult = serde_json::from_value(serde_json::json!({
//!     "content": [{"type": "text", "text": "3"}]
//! }))?;
//! assert_eq!(result.flatten(), serde_json::json!("3"));
//! # Ok::<(), serde_json::Error>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod capability;
pub mod error;
pub mod identity;
pub mod protocol;
pub mod types;

pub use capability::{
    ClientCapabilities, ClientInfo, InitializeRequest, InitializeResult, PROTOCOL_VERSION,
    SUPPORTED_PROTOCOL_VERSIONS, ServerCapabilities, ServerInfo, is_version_supported,
};
pub use error::{BridgeError, BridgeResult, JsonRpcError};
pub use identity::ServerIdentity;
pub use protocol::{Message, Notification, Request, RequestId, Response};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::capability::{
        ClientCapabilities, ClientInfo, InitializeResult, ServerCapabilities, ServerInfo,
    };
    pub use crate::error::{BridgeError, BridgeResult};
    pub use crate::identity::ServerIdentity;
    pub use crate::protocol::{Message, Notification, Request, RequestId, Response};
    pub use crate::types::{
        CallToolResult, Content, ReadResourceResult, Resource, ResourceContents,
        ResourceTemplate, Tool,
    };
}
