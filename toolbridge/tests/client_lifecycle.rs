//! Connection lifecycle against the mock server.

mod common;

use std::time::Duration;

use common::{client_for, connected, names, next_event};
use pretty_assertions::assert_eq;
use toolbridge::PROTOCOL_VERSION;
use toolbridge::prelude::*;
use toolbridge::types::methods::{INITIALIZE, NOTIFICATION_INITIALIZED, TOOLS_LIST};
use toolbridge_testing::{MockServer, sample_resources, sample_templates, sample_tools};

fn full_server() -> MockServer {
    MockServer::builder()
        .name("calculator")
        .version("2.1.0")
        .instructions("Use add for sums")
        .tools(sample_tools())
        .resources(sample_resources())
        .template(sample_templates().remove(0))
        .build()
}

#[tokio::test]
async fn test_connect_discovers_everything() {
    let (client, handle) = connected(full_server()).await;

    assert_eq!(client.state(), ClientState::Ready);
    assert!(client.is_connected());
    let info = client.server_info().unwrap();
    assert_eq!(info.name, "calculator");
    assert_eq!(info.version, "2.1.0");
    assert_eq!(client.instructions().as_deref(), Some("Use add for sums"));
    assert_eq!(client.protocol_version().as_deref(), Some(PROTOCOL_VERSION));
    assert!(client.server_capabilities().unwrap().has_tools());

    assert_eq!(
        names(&client.get_tools()),
        ["add", "echo", "fail", "inspect", "multiply"]
    );
    assert_eq!(client.get_resources().len(), 3);
    assert_eq!(client.get_resource_templates().len(), 1);

    let init = handle.requests(INITIALIZE);
    assert_eq!(init.len(), 1);
    let params = init[0].params.clone().unwrap();
    assert_eq!(params["protocolVersion"], PROTOCOL_VERSION);
    assert_eq!(params["clientInfo"]["name"], "toolbridge");
    assert_eq!(handle.notifications(), [NOTIFICATION_INITIALIZED]);
}

#[tokio::test]
async fn test_events_follow_connection() {
    let (client, _handle) = client_for(full_server(), ClientBuilder::new("calc"));
    let mut events = client.subscribe();
    client.connect().await.unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.kind());
    }
    assert_eq!(kinds, ["tools_changed", "resources_changed", "connected"]);

    client.disconnect().await;
    assert!(matches!(events.recv().await, Ok(ClientEvent::Disconnected)));
}

#[tokio::test]
async fn test_disconnect_clears_everything() {
    let (client, _handle) = connected(full_server()).await;
    client.disconnect().await;

    assert_eq!(client.state(), ClientState::Disconnected);
    assert!(!client.is_connected());
    assert!(client.get_tools().is_empty());
    assert!(client.get_resources().is_empty());
    assert!(client.server_info().is_none());
    assert!(matches!(client.ping().await, Err(BridgeError::NotReady { .. })));

    // Idempotent.
    client.disconnect().await;
    assert_eq!(client.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn test_second_connect_is_rejected() {
    let (client, _handle) = connected(full_server()).await;
    assert!(matches!(
        client.connect().await,
        Err(BridgeError::AlreadyConnected)
    ));
    assert_eq!(client.state(), ClientState::Ready);
}

#[tokio::test]
async fn test_unsupported_protocol_version_fails_handshake() {
    let server = MockServer::builder()
        .protocol_version("1999-01-01")
        .tools(sample_tools())
        .build();
    let (client, handle) = client_for(server, ClientBuilder::new("old"));
    let mut events = client.subscribe();

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, BridgeError::HandshakeFailed(_)), "{err}");
    assert_eq!(client.state(), ClientState::Error);
    assert!(matches!(events.recv().await, Ok(ClientEvent::Error { .. })));
    assert!(handle.requests(TOOLS_LIST).is_empty());

    assert!(matches!(
        client.connect().await,
        Err(BridgeError::InvalidState { .. })
    ));
    client.disconnect().await;
    assert_eq!(client.state(), ClientState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_silent_server_times_out_handshake() {
    let server = MockServer::builder().silent(INITIALIZE).build();
    let (client, _handle) = client_for(
        server,
        ClientBuilder::new("silent").request_timeout(Duration::from_secs(2)),
    );

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, BridgeError::HandshakeFailed(_)), "{err}");
    assert_eq!(client.state(), ClientState::Error);
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn test_server_close_tears_client_down() {
    let (client, handle) = connected(full_server()).await;
    let mut events = client.subscribe();

    handle.close().await;
    next_event(&mut events, |e| matches!(e, ClientEvent::Disconnected).then_some(())).await;

    assert_eq!(client.state(), ClientState::Disconnected);
    assert!(client.get_tools().is_empty());
}

#[tokio::test]
async fn test_on_event_handler_sees_connection() {
    let (client, _handle) = client_for(full_server(), ClientBuilder::new("calc"));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let task = client.on_event(move |event| {
        let _ = tx.send(event.kind());
    });

    client.connect().await.unwrap();
    let mut seen = Vec::new();
    while let Some(kind) = rx.recv().await {
        seen.push(kind);
        if kind == "connected" {
            break;
        }
    }
    assert_eq!(seen.last(), Some(&"connected"));
    task.abort();
}
