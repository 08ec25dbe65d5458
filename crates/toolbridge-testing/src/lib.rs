//! Testing utilities for toolbridge clients.
//!
//! This crate provides a scripted tool server, fixtures and assertions:
//!
//! - [`MockServer`] answers the protocol from in-memory definitions, over a
//!   memory transport or (feature `http`) a local HTTP endpoint
//! - [`fixtures`] holds pre-configured tools, resources and templates
//! - [`assertions`] checks tool results
//!
//! # Mock Server
//!
//! ```rust
//! use toolbridge_testing::{MockServer, MockTool};
//! use toolbridge_core::types::CallToolResult;
//! use toolbridge_transport::MemoryTransport;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let server = MockServer::builder()
//!     .tool(MockTool::new("add")
//!         .description("Add two numbers")
//!         .handler(|_args| CallToolResult::text("42")))
//!     .build();
//!
//! let (transport, peer) = MemoryTransport::pair();
//! let handle = server.serve(peer);
//! // Hand `transport` to a client; `handle` records what it sent.
//! # drop((transport, handle));
//! # }
//! ```

#![deny(missing_docs)]

pub mod assertions;
pub mod fixtures;
#[cfg(feature = "http")]
pub mod http;
pub mod mock;

// Re-export commonly used types
pub use assertions::{assert_tool_error, assert_tool_success};
pub use fixtures::{sample_resources, sample_templates, sample_tools};
#[cfg(feature = "http")]
pub use http::MockHttpServer;
pub use mock::{MockHandle, MockResource, MockResponse, MockServer, MockServerBuilder, MockTool};
