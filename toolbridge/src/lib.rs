//! # toolbridge
//!
//! A client for tool servers that speak JSON-RPC 2.0, either as a child
//! process exchanging line-delimited JSON or as a streamable HTTP endpoint.
//!
//! One [`Client`] owns one server connection. It negotiates the protocol
//! version, discovers the server's tools and resources, keeps that catalog
//! current as the server announces changes, and executes tool calls with
//! per-request timeouts.
//!
//! ## Quick Start
//!
//! ```no_run
//! use toolbridge::prelude::*;
//!
//! # async fn example() -> BridgeResult<()> {
//! let client = ClientBuilder::new("calculator")
//!     .build_with_options(&TransportOptions::http("http://localhost:8080/mcp"), None)?;
//! client.connect().await?;
//!
//! for tool in client.get_tools() {
//!     println!("{}: {}", tool.name, tool.description.as_deref().unwrap_or(""));
//! }
//!
//! let sum = client
//!     .execute_tool(ToolCall::new("add", serde_json::json!({"a": 1, "b": 2})))
//!     .await?;
//! assert_eq!(sum, "3");
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Organization
//!
//! - [`toolbridge_core`] - Wire envelope, capability and tool types, errors
//! - [`toolbridge_transport`] - Host-process, HTTP and in-memory transports
//! - [`toolbridge_client`] - The client: lifecycle, correlation, discovery

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

// Re-export all public items from core
pub use toolbridge_core::*;

// Re-export client types
pub use toolbridge_client::{
    Catalog, Client, ClientBuilder, ClientConfig, ClientEvent, ClientState, ServerConfig,
    ToolCall, coerce_arguments,
};

// Re-export transport types
pub use toolbridge_transport::{
    AnyTransport, LocalProcessHost, MemoryTransport, ProcessHost, Transport, TransportError,
    TransportEvent, TransportMetadata, TransportOptions,
};

pub mod prelude;

/// Transport module re-exports
pub mod transport {
    //! Transport layer types.
    pub use toolbridge_transport::*;
}

/// Client module re-exports
pub mod client {
    //! Client implementation types.
    pub use toolbridge_client::*;
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;
        let _ = std::any::type_name::<BridgeError>();
        let _ = std::any::type_name::<Client<MemoryTransport>>();
    }
}
