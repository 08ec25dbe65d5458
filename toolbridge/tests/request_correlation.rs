//! Matching responses to requests: concurrency, timeouts, teardown.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::{client_for, connected};
use pretty_assertions::assert_eq;
use serde_json::json;
use toolbridge::prelude::*;
use toolbridge::types::methods::TOOLS_CALL;
use toolbridge_testing::{MockServer, MockTool};

fn timed_server() -> MockServer {
    MockServer::builder()
        .tool(
            MockTool::new("slow")
                .returns_text("slow done")
                .delay(Duration::from_millis(300)),
        )
        .tool(
            MockTool::new("medium")
                .returns_text("medium done")
                .delay(Duration::from_millis(100)),
        )
        .tool(MockTool::new("fast").returns_text("fast done"))
        .tool(
            MockTool::new("stuck")
                .returns_text("too late")
                .delay(Duration::from_secs(60)),
        )
        .build()
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_responses_reach_their_callers() {
    let (client, _handle) = connected(timed_server()).await;

    let (slow, medium, fast) = tokio::join!(
        client.execute_tool(ToolCall::without_arguments("slow")),
        client.execute_tool(ToolCall::without_arguments("medium")),
        client.execute_tool(ToolCall::without_arguments("fast")),
    );

    assert_eq!(slow.unwrap(), json!("slow done"));
    assert_eq!(medium.unwrap(), json!("medium done"));
    assert_eq!(fast.unwrap(), json!("fast done"));
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_many_concurrent_calls_use_distinct_ids() {
    let (client, handle) = connected(timed_server()).await;

    let calls = (0..20).map(|_| client.execute_tool(ToolCall::without_arguments("fast")));
    let results = futures::future::join_all(calls).await;
    assert!(results.iter().all(Result::is_ok));

    let ids: HashSet<RequestId> = handle
        .received()
        .iter()
        .filter_map(Message::as_request)
        .map(|r| r.id.clone())
        .collect();
    let requests = handle
        .received()
        .iter()
        .filter(|m| m.as_request().is_some())
        .count();
    assert_eq!(ids.len(), requests);
    assert_eq!(handle.requests(TOOLS_CALL).len(), 20);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_then_late_response_is_dropped() {
    let (client, handle) = client_for(
        timed_server(),
        ClientBuilder::new("timed").request_timeout(Duration::from_secs(1)),
    );
    client.connect().await.unwrap();

    let err = client
        .execute_tool(ToolCall::without_arguments("stuck"))
        .await
        .unwrap_err();
    assert!(err.is_recoverable());
    match err {
        BridgeError::Timeout { method, duration, .. } => {
            assert_eq!(method, TOOLS_CALL);
            assert_eq!(duration, Duration::from_secs(1));
        }
        other => panic!("expected timeout, got {other}"),
    }
    assert_eq!(client.pending_requests(), 0);

    // Let the stuck reply arrive; the client must shrug it off.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(client.state(), ClientState::Ready);
    assert_eq!(
        client
            .execute_tool(ToolCall::without_arguments("fast"))
            .await
            .unwrap(),
        json!("fast done")
    );
    assert_eq!(handle.requests(TOOLS_CALL).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_rejects_in_flight_requests() {
    let (client, handle) = connected(timed_server()).await;

    let call = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .execute_tool(ToolCall::without_arguments("stuck"))
                .await
        })
    };
    handle.wait_for(TOOLS_CALL, 1).await;
    assert_eq!(client.pending_requests(), 1);

    client.disconnect().await;
    assert!(matches!(
        call.await.unwrap(),
        Err(BridgeError::ConnectionClosed)
    ));
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn test_server_error_keeps_code() {
    let server = MockServer::builder()
        .fail_method("custom/op", -32000, "backend down")
        .build();
    let (client, _handle) = connected(server).await;

    match client.send_request("custom/op", None).await {
        Err(BridgeError::Protocol { code, message, .. }) => {
            assert_eq!(code, -32000);
            assert_eq!(message, "backend down");
        }
        other => panic!("expected protocol error, got {other:?}"),
    }
    assert!(matches!(
        client.send_request("custom/unknown", None).await,
        Err(BridgeError::UnsupportedMethod { .. })
    ));
    client.ping().await.unwrap();
}
