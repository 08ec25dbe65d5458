//! Streamable HTTP client transport.
//!
//! Every outbound frame is an HTTP POST to one endpoint. The server answers
//! with a JSON body (a single frame or a batch), with a Server-Sent Events
//! stream carrying one frame per event, or with `202 Accepted` and no body.
//! Whatever the answer carries is pushed onto the transport's event channel,
//! so responses reach the client through the same path as they would on a
//! stream transport.
//!
//! # Sessions
//!
//! A session id issued in the `mcp-session-id` response header is echoed on
//! every later request. A `404` on a request that carried a session means the
//! server dropped it: the id is cleared and the send fails with
//! [`TransportError::SessionExpired`](crate::TransportError::SessionExpired).
//! Closing the transport terminates the session with a `DELETE`.
//!
//! # Push stream
//!
//! Servers that push notifications outside of a request do so on a long-lived
//! `GET` event stream. The transport tries to open it on connect and again
//! once a session is first issued; servers without one are used in plain
//! request/response mode.
//!
//! # Example
//!
//! ```rust
//! use toolbridge_transport::http::HttpTransportConfig;
//! use std::time::Duration;
//!
//! let config = HttpTransportConfig::new("http://localhost:8080/mcp")
//!     .with_request_timeout(Duration::from_secs(60))
//!     .with_header("Authorization", "Bearer token");
//!
//! assert_eq!(config.base_url, "http://localhost:8080/mcp");
//! assert!(config.push_stream);
//! ```

mod client;
mod config;
mod sse;

pub use client::HttpTransport;
pub use config::{
    DEFAULT_MAX_MESSAGE_SIZE, HttpTransportConfig, MCP_PROTOCOL_VERSION_HEADER,
    MCP_SESSION_ID_HEADER,
};
pub use sse::SseParser;
