//! Transport traits.
//!
//! A transport is a message channel to one tool server. Outbound frames go
//! through [`Transport::send`]; inbound frames, errors, and the close signal
//! arrive as [`TransportEvent`]s on the receiver handed out by
//! [`Transport::connect`]. The receiver is the only inbound path, so whoever
//! holds it sees every event in arrival order.
//!
//! # Example
//!
//! ```ignore
//! use toolbridge_transport::{Transport, TransportEvent};
//!
//! async fn pump<T: Transport>(transport: &T) -> Result<(), TransportError> {
//!     let mut events = transport.connect().await?;
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             TransportEvent::Message(msg) => println!("{}", msg.kind()),
//!             TransportEvent::Error(err) => eprintln!("{err}"),
//!             TransportEvent::Closed => break,
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use std::future::Future;

use tokio::sync::mpsc;
use toolbridge_core::protocol::Message;

use crate::error::TransportError;

/// Capacity of the inbound event channel each transport creates on connect.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something the transport observed on the inbound side.
#[derive(Debug)]
pub enum TransportEvent {
    /// A decoded frame from the server.
    Message(Message),
    /// A non-fatal transport failure, such as a host process error report.
    Error(TransportError),
    /// The channel is gone. Nothing follows this event.
    Closed,
}

/// Receiving end of a transport's inbound events.
pub type EventReceiver = mpsc::Receiver<TransportEvent>;

/// Sending end of a transport's inbound events.
pub type EventSender = mpsc::Sender<TransportEvent>;

/// Metadata about a transport.
#[derive(Debug, Clone, Default)]
pub struct TransportMetadata {
    /// Transport type identifier (`host-process`, `http`, `memory`).
    pub transport_type: String,
    /// Remote endpoint, if applicable.
    pub remote_addr: Option<String>,
    /// Whether the server can push frames without a preceding request.
    pub bidirectional: bool,
}

impl TransportMetadata {
    /// Create new metadata for a transport type.
    #[must_use]
    pub fn new(transport_type: impl Into<String>) -> Self {
        Self {
            transport_type: transport_type.into(),
            remote_addr: None,
            bidirectional: true,
        }
    }

    /// Set the remote address.
    #[must_use]
    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Set bidirectional flag.
    #[must_use]
    pub fn bidirectional(mut self, bidirectional: bool) -> Self {
        self.bidirectional = bidirectional;
        self
    }
}

/// A message channel to a single tool server.
///
/// Implementations must be `Send + Sync`; `send` may be called from many
/// tasks at once while a single task drains the event receiver.
pub trait Transport: Send + Sync {
    /// Open the channel and hand back its inbound event stream.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AlreadyConnected`] if the transport is open,
    /// or the underlying failure if the channel could not be established.
    fn connect(&self) -> impl Future<Output = Result<EventReceiver, TransportError>> + Send;

    /// Send a message over the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is not connected or the write failed.
    fn send(&self, msg: Message) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the transport. Closing a closed transport is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the close operation failed.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Check if the transport is open.
    fn is_connected(&self) -> bool;

    /// Get metadata about the transport.
    fn metadata(&self) -> TransportMetadata;
}
