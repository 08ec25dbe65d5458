//! Transports for the toolbridge client.
//!
//! A transport moves JSON-RPC frames between the client and one tool server.
//! Outbound frames go through [`Transport::send`]; everything inbound arrives
//! as a [`TransportEvent`] on the receiver returned by
//! [`Transport::connect`].
//!
//! # Available Transports
//!
//! | Transport | Use Case | Feature Flag |
//! |-----------|----------|--------------|
//! | [`HostProcessTransport`] | Servers run as child processes by a [`ProcessHost`] | Always available |
//! | [`LocalProcessHost`] | Bundled host built on `tokio::process` | Always available |
//! | [`http::HttpTransport`] | Streamable HTTP servers | `http` (default) |
//! | [`MemoryTransport`] | Testing and in-process servers | Always available |
//!
//! [`AnyTransport`] picks one of these at runtime from serializable
//! [`TransportOptions`].
//!
//! # Example
//!
//! ```rust
//! use toolbridge_transport::{MemoryTransport, Transport, TransportEvent};
//! use toolbridge_core::protocol::Response;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), toolbridge_transport::TransportError> {
//! let (transport, peer) = MemoryTransport::pair();
//! let mut events = transport.connect().await?;
//!
//! peer.send(Response::success(1u64, serde_json::json!({}))).await?;
//! assert!(matches!(events.recv().await, Some(TransportEvent::Message(_))));
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod error;
pub mod host;
#[cfg(feature = "http")]
pub mod http;
pub mod memory;
pub mod options;
pub mod process;
pub mod traits;

pub use error::TransportError;
pub use host::{HostEvent, HostEventReceiver, HostProcessTransport, ProcessHost, ProcessSpec};
pub use memory::{MemoryPeer, MemoryPeerSender, MemoryTransport};
pub use options::{AnyTransport, TransportOptions};
pub use process::{LocalProcessHost, ProcessStatus};
pub use traits::{
    EVENT_CHANNEL_CAPACITY, EventReceiver, EventSender, Transport, TransportEvent,
    TransportMetadata,
};

#[cfg(feature = "http")]
pub use http::{HttpTransport, HttpTransportConfig};
