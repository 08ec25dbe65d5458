//! Shared setup for the integration tests.

#![allow(dead_code)]

use std::time::Duration;

use tokio::sync::broadcast;
use toolbridge::prelude::*;
use toolbridge_testing::{MockHandle, MockServer};
use tracing_subscriber::EnvFilter;

/// Install a subscriber honoring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A client wired to `server` over the in-memory transport, not yet connected.
pub fn client_for(server: MockServer, builder: ClientBuilder) -> (Client<MemoryTransport>, MockHandle) {
    init_tracing();
    let (transport, peer) = MemoryTransport::pair();
    let handle = server.serve(peer);
    (builder.build(transport), handle)
}

/// A connected client.
pub async fn connected(server: MockServer) -> (Client<MemoryTransport>, MockHandle) {
    let (client, handle) = client_for(server, ClientBuilder::new("mock"));
    client.connect().await.expect("connect");
    (client, handle)
}

/// Wait for the first event matching `pick`.
pub async fn next_event<T>(
    events: &mut broadcast::Receiver<ClientEvent>,
    mut pick: impl FnMut(ClientEvent) -> Option<T>,
) -> T {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(found) = pick(event) {
                        return found;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("event did not arrive")
}

pub fn names(tools: &[Tool]) -> Vec<&str> {
    tools.iter().map(|t| t.name.as_str()).collect()
}
