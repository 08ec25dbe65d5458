//! In-memory transport for testing.
//!
//! [`MemoryTransport::pair`] returns a client-side [`Transport`] and a
//! [`MemoryPeer`] that plays the server. Frames the client sends show up on
//! [`MemoryPeer::recv`]; frames the peer sends arrive on the client's event
//! receiver exactly as a real transport would deliver them.
//!
//! # Example
//!
//! ```rust
//! use toolbridge_transport::{MemoryTransport, Transport};
//!
//! let (transport, _peer) = MemoryTransport::pair();
//! assert!(!transport.is_connected());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use async_lock::Mutex as AsyncMutex;
use tokio::sync::mpsc;
use toolbridge_core::protocol::Message;

use crate::error::TransportError;
use crate::traits::{
    EVENT_CHANNEL_CAPACITY, EventReceiver, EventSender, Transport, TransportEvent,
    TransportMetadata,
};

/// Client side of an in-memory channel.
///
/// A memory transport can be connected once; its event receiver is handed
/// out on the first `connect`.
pub struct MemoryTransport {
    outbound: AsyncMutex<Option<mpsc::UnboundedSender<Message>>>,
    inbound: AsyncMutex<Option<EventReceiver>>,
    connected: AtomicBool,
}

impl MemoryTransport {
    /// Create a client transport and the peer that answers it.
    #[must_use]
    pub fn pair() -> (Self, MemoryPeer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let transport = Self {
            outbound: AsyncMutex::new(Some(out_tx)),
            inbound: AsyncMutex::new(Some(event_rx)),
            connected: AtomicBool::new(false),
        };
        let peer = MemoryPeer {
            inbound: out_rx,
            sender: MemoryPeerSender { events: event_tx },
        };
        (transport, peer)
    }
}

impl Transport for MemoryTransport {
    async fn connect(&self) -> Result<EventReceiver, TransportError> {
        if self.connected.load(Ordering::Acquire) {
            return Err(TransportError::AlreadyConnected);
        }
        let receiver = self
            .inbound
            .lock()
            .await
            .take()
            .ok_or_else(|| TransportError::connection("memory transport cannot be reopened"))?;
        self.connected.store(true, Ordering::Release);
        Ok(receiver)
    }

    async fn send(&self, msg: Message) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        match self.outbound.lock().await.as_ref() {
            Some(sender) => sender
                .send(msg)
                .map_err(|_| TransportError::ConnectionClosed),
            None => Err(TransportError::NotConnected),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::Release);
        self.outbound.lock().await.take();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn metadata(&self) -> TransportMetadata {
        TransportMetadata::new("memory").remote_addr("peer")
    }
}

/// Server side of an in-memory channel.
pub struct MemoryPeer {
    inbound: mpsc::UnboundedReceiver<Message>,
    sender: MemoryPeerSender,
}

impl MemoryPeer {
    /// Next frame sent by the client, or `None` once the client closed.
    pub async fn recv(&mut self) -> Option<Message> {
        self.inbound.recv().await
    }

    /// A cloneable handle for pushing frames to the client.
    #[must_use]
    pub fn sender(&self) -> MemoryPeerSender {
        self.sender.clone()
    }

    /// Push a frame to the client.
    pub async fn send(&self, msg: impl Into<Message>) -> Result<(), TransportError> {
        self.sender.send(msg).await
    }

    /// Signal the client that the channel closed.
    pub async fn close(&self) {
        self.sender.close().await;
    }
}

/// Cloneable sending half of a [`MemoryPeer`].
#[derive(Clone)]
pub struct MemoryPeerSender {
    events: EventSender,
}

impl MemoryPeerSender {
    /// Push a frame to the client.
    pub async fn send(&self, msg: impl Into<Message>) -> Result<(), TransportError> {
        self.events
            .send(TransportEvent::Message(msg.into()))
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Report a transport-level failure to the client.
    pub async fn send_error(&self, err: TransportError) -> Result<(), TransportError> {
        self.events
            .send(TransportEvent::Error(err))
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Signal the client that the channel closed.
    pub async fn close(&self) {
        let _ = self.events.send(TransportEvent::Closed).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolbridge_core::protocol::{Notification, Request, Response};

    #[tokio::test]
    async fn test_connect_once() {
        let (transport, _peer) = MemoryTransport::pair();
        assert!(!transport.is_connected());

        let _events = transport.connect().await.unwrap();
        assert!(transport.is_connected());
        assert!(matches!(
            transport.connect().await,
            Err(TransportError::AlreadyConnected)
        ));
    }

    #[tokio::test]
    async fn test_send_receive() {
        let (transport, mut peer) = MemoryTransport::pair();
        let mut events = transport.connect().await.unwrap();

        transport
            .send(Request::new("ping", 1u64).into())
            .await
            .unwrap();
        let received = peer.recv().await.unwrap();
        assert_eq!(received.method(), Some("ping"));

        peer.send(Response::success(1u64, serde_json::json!({})))
            .await
            .unwrap();
        match events.recv().await {
            Some(TransportEvent::Message(Message::Response(r))) => {
                assert_eq!(r.id.as_number(), Some(1));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_peer_close_emits_closed() {
        let (transport, peer) = MemoryTransport::pair();
        let mut events = transport.connect().await.unwrap();

        peer.close().await;
        assert!(matches!(events.recv().await, Some(TransportEvent::Closed)));
    }

    #[tokio::test]
    async fn test_send_after_close() {
        let (transport, mut peer) = MemoryTransport::pair();
        let _events = transport.connect().await.unwrap();

        transport.close().await.unwrap();
        assert!(!transport.is_connected());
        assert!(matches!(
            transport
                .send(Notification::new("notifications/initialized").into())
                .await,
            Err(TransportError::NotConnected)
        ));
        assert!(peer.recv().await.is_none());
    }
}
