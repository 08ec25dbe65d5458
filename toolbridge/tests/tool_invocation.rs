//! Executing tools and reading resources through a connected client.

mod common;

use common::connected;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use toolbridge::error::codes;
use toolbridge::prelude::*;
use toolbridge::types::methods::TOOLS_CALL;
use toolbridge_testing::{MockServer, MockTool, sample_resources, sample_tools};

fn server() -> MockServer {
    MockServer::builder()
        .tools(sample_tools())
        .resources(sample_resources())
        .tool(MockTool::new("nothing").returns_parts(Vec::new()))
        .tool(MockTool::new("pair").returns_parts(vec![
            Content::text("first"),
            Content::image("aGVsbG8=", "image/png"),
        ]))
        .build()
}

/// Arguments the server actually received for the last call.
fn last_arguments(handle: &toolbridge_testing::MockHandle) -> Value {
    handle
        .requests(TOOLS_CALL)
        .last()
        .and_then(|r| r.params.clone())
        .map(|p| p["arguments"].clone())
        .unwrap_or(Value::Null)
}

#[tokio::test]
async fn test_add() {
    let (client, handle) = connected(server()).await;

    let sum = client
        .execute_tool(ToolCall::new("add", json!({"a": 1, "b": 2})))
        .await
        .unwrap();
    assert_eq!(sum, json!("3"));
    assert_eq!(last_arguments(&handle), json!({"a": 1, "b": 2}));
}

#[tokio::test]
async fn test_stringified_object_argument_is_parsed() {
    let (client, handle) = connected(server()).await;

    let echoed = client
        .execute_tool(ToolCall::new(
            "inspect",
            json!({"filter": "{\"tags\": [\"rust\"]}", "label": "{\"keep\": \"as string\"}"}),
        ))
        .await
        .unwrap();

    let expected = json!({"filter": {"tags": ["rust"]}, "label": "{\"keep\": \"as string\"}"});
    assert_eq!(echoed, expected);
    assert_eq!(last_arguments(&handle), expected);
}

#[tokio::test]
async fn test_unparseable_string_is_sent_unchanged() {
    let (client, handle) = connected(server()).await;

    client
        .execute_tool(ToolCall::new("inspect", json!({"filter": "not json"})))
        .await
        .unwrap();
    assert_eq!(last_arguments(&handle), json!({"filter": "not json"}));
}

#[tokio::test]
async fn test_is_error_becomes_tool_execution() {
    let (client, _handle) = connected(server()).await;

    let err = client
        .execute_tool(ToolCall::without_arguments("fail"))
        .await
        .unwrap_err();
    match &err {
        BridgeError::ToolExecution(details) => {
            assert_eq!(details.tool, "fail");
            assert_eq!(details.message, "This tool always fails");
            assert_eq!(details.output, json!("This tool always fails"));
        }
        other => panic!("expected tool execution error, got {other}"),
    }
    assert!(err.is_recoverable());
    assert_eq!(client.state(), ClientState::Ready);
}

#[tokio::test]
async fn test_method_not_found_on_call_keeps_server_message() {
    let server = MockServer::builder()
        .tool(MockTool::new("rm"))
        .fail_method(TOOLS_CALL, codes::METHOD_NOT_FOUND, "Tool 'rm' disabled")
        .build();
    let (client, handle) = connected(server).await;

    let err = client
        .execute_tool(ToolCall::without_arguments("rm"))
        .await
        .unwrap_err();
    match &err {
        BridgeError::UnsupportedMethod { method, message, .. } => {
            assert_eq!(method, TOOLS_CALL);
            assert_eq!(message, "Tool 'rm' disabled");
        }
        other => panic!("expected unsupported method, got {other:?}"),
    }
    assert_eq!(err.code(), codes::METHOD_NOT_FOUND);
    assert_eq!(handle.requests(TOOLS_CALL).len(), 1);
    assert_eq!(client.state(), ClientState::Ready);
}

#[tokio::test]
async fn test_result_flattening() {
    let (client, _handle) = connected(server()).await;

    let nothing = client
        .execute_tool(ToolCall::without_arguments("nothing"))
        .await
        .unwrap();
    assert_eq!(nothing, Value::Null);

    let pair = client
        .execute_tool(ToolCall::without_arguments("pair"))
        .await
        .unwrap();
    assert_eq!(
        pair,
        json!([
            "first",
            {"type": "image", "data": "aGVsbG8=", "mimeType": "image/png"}
        ])
    );
}

#[tokio::test]
async fn test_argument_errors_are_local() {
    let (client, handle) = connected(server()).await;

    assert!(matches!(
        client
            .execute_tool(ToolCall::without_arguments("missing"))
            .await,
        Err(BridgeError::UnknownTool { name }) if name == "missing"
    ));
    match client.execute_tool(ToolCall::new("add", json!([1, 2]))).await {
        Err(BridgeError::Protocol { code, .. }) => assert_eq!(code, codes::INVALID_PARAMS),
        other => panic!("expected invalid params, got {other:?}"),
    }
    assert!(handle.requests(TOOLS_CALL).is_empty());
}

#[tokio::test]
async fn test_read_resource() {
    let (client, _handle) = connected(server()).await;

    let read = client.get_resource("file:///config.json").await.unwrap();
    assert_eq!(read.contents.len(), 1);
    assert_eq!(read.contents[0].mime_type.as_deref(), Some("application/json"));
    assert!(read.contents[0].as_text().unwrap().contains("8080"));

    match client.get_resource("file:///missing").await {
        Err(BridgeError::Protocol { code, .. }) => assert_eq!(code, codes::RESOURCE_NOT_FOUND),
        other => panic!("expected resource not found, got {other:?}"),
    }
}
