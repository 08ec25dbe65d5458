//! Client side of the toolbridge protocol.
//!
//! One [`Client`] manages one tool server: it opens the transport, performs
//! the `initialize` handshake, discovers the server's tools and resources,
//! and then executes tool calls on behalf of the caller.
//!
//! # Overview
//!
//! - [`client`]: lifecycle, request correlation and inbound dispatch
//! - [`discovery`]: paginated enumeration feeding the [`catalog`]
//! - [`coerce`]: normalization of stringified JSON arguments
//! - [`pending`]: the table matching responses to waiting requests
//! - [`state`]: the lifecycle state machine
//!
//! # Example
//!
//! ```no_run
//! use toolbridge_client::{ClientBuilder, ClientEvent, ToolCall};
//! use toolbridge_transport::TransportOptions;
//!
//! # async fn example() -> Result<(), toolbridge_core::BridgeError> {
//! let client = ClientBuilder::new("search")
//!     .name("my-agent")
//!     .build_with_options(&TransportOptions::http("https://tools.example.com/mcp"), None)?;
//!
//! client.on_event(|event| {
//!     if let ClientEvent::ToolsChanged(tools) = event {
//!         println!("{} tools available", tools.len());
//!     }
//! });
//!
//! client.connect().await?;
//! let hits = client
//!     .execute_tool(ToolCall::new("search", serde_json::json!({"query": "rust"})))
//!     .await?;
//! println!("{hits}");
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod builder;
pub mod catalog;
pub mod client;
pub mod coerce;
pub mod config;
pub mod discovery;
pub mod event;
pub mod pending;
pub mod state;

// Re-export commonly used types
pub use builder::ClientBuilder;
pub use catalog::Catalog;
pub use client::{Client, ToolCall};
pub use coerce::coerce_arguments;
pub use config::{ClientConfig, ServerConfig};
pub use event::ClientEvent;
pub use pending::{PendingRequests, Resolution};
pub use state::ClientState;
