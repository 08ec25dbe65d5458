//! The client over streamable HTTP against the mock's axum endpoint.

#![cfg(feature = "http")]

mod common;

use common::{init_tracing, names};
use pretty_assertions::assert_eq;
use serde_json::json;
use toolbridge::prelude::*;
use toolbridge::types::methods::{INITIALIZE, TOOLS_CALL};
use toolbridge_testing::{MockHttpServer, MockServer, sample_resources, sample_tools};

async fn http_server() -> MockHttpServer {
    init_tracing();
    MockServer::builder()
        .name("http-mock")
        .tools(sample_tools())
        .resources(sample_resources())
        .build()
        .serve_http()
        .await
        .unwrap()
}

fn http_client(server: &MockHttpServer) -> Client<AnyTransport> {
    ServerConfig::new("http-mock", TransportOptions::http(server.url()))
        .client(ClientConfig::default(), None)
        .unwrap()
}

#[tokio::test]
async fn test_connect_and_call_over_http() {
    let server = http_server().await;
    let client = http_client(&server);

    client.connect().await.unwrap();
    assert_eq!(client.transport().metadata().transport_type, "http");
    assert_eq!(client.server_info().unwrap().name, "http-mock");
    assert_eq!(
        names(&client.get_tools()),
        ["add", "echo", "fail", "inspect", "multiply"]
    );
    assert_eq!(client.get_resources().len(), 3);

    let product = client
        .execute_tool(ToolCall::new("multiply", json!({"a": 6, "b": 7})))
        .await
        .unwrap();
    assert_eq!(product, json!("42"));
    assert_eq!(server.handle().requests(TOOLS_CALL).len(), 1);
    assert!(server.session_id().is_some());

    client.disconnect().await;
    assert_eq!(client.state(), ClientState::Disconnected);
    assert_eq!(server.deletes(), [server.session_id()]);
}

#[tokio::test]
async fn test_expired_session_surfaces_and_reconnect_recovers() {
    let server = http_server().await;
    let client = http_client(&server);
    client.connect().await.unwrap();
    let first_session = server.session_id();

    server.expire_session();
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, BridgeError::SessionExpired { .. }), "{err}");
    assert!(err.is_recoverable());

    client.disconnect().await;
    client.connect().await.unwrap();
    assert_eq!(server.handle().requests(INITIALIZE).len(), 2);
    assert!(server.session_id().is_some());
    assert_ne!(server.session_id(), first_session);
    client.ping().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_endpoint_fails_connect() {
    init_tracing();
    let client = ServerConfig::new("nowhere", TransportOptions::http("http://127.0.0.1:9/mcp"))
        .client(ClientConfig::default(), None)
        .unwrap();

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, BridgeError::HandshakeFailed(_)), "{err}");
    assert_eq!(client.state(), ClientState::Error);
}
