//! JSON-RPC 2.0 envelope exchanged with tool servers.
//!
//! Every frame on the wire is one of three kinds:
//!
//! - **Request**: carries an `id` and expects exactly one response
//! - **Response**: echoes the request `id` with either a `result` or an `error`
//! - **Notification**: fire-and-forget, no `id`
//!
//! Correlation happens solely through the echoed [`RequestId`].
//!
//! # Example
//!
//! ```rust
//! use toolbridge_core::protocol::{Message, Request, RequestId};
//!
//! let request = Request::new("tools/list", RequestId::Number(1));
//! let wire = serde_json::to_string(&Message::from(request))?;
//!
//! let parsed: Message = serde_json::from_str(&wire)?;
//! assert_eq!(parsed.method(), Some("tools/list"));
//! # Ok::<(), serde_json::Error>(())
//! ```

use crate::error::{JsonRpcError, codes};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;

/// The JSON-RPC version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// Identifier used to pair a response with its request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id. The client only ever allocates these.
    Number(u64),
    /// String id, accepted from servers that issue their own requests.
    String(String),
}

impl RequestId {
    /// Numeric value of the id, if it is numeric.
    #[must_use]
    pub const fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(_) => None,
        }
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self::String(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::String(id.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// A method call expecting a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Always `"2.0"`.
    pub jsonrpc: Cow<'static, str>,
    /// Correlation id.
    pub id: RequestId,
    /// Method name, e.g. `tools/call`.
    pub method: Cow<'static, str>,
    /// Method parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Create a request without parameters.
    #[must_use]
    pub fn new(method: impl Into<Cow<'static, str>>, id: impl Into<RequestId>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            id: id.into(),
            method: method.into(),
            params: None,
        }
    }

    /// Create a request carrying parameters.
    #[must_use]
    pub fn with_params(
        method: impl Into<Cow<'static, str>>,
        id: impl Into<RequestId>,
        params: Value,
    ) -> Self {
        Self {
            params: Some(params),
            ..Self::new(method, id)
        }
    }
}

/// Reply to a [`Request`].
///
/// A well-formed response carries either `result` or `error`, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Always `"2.0"`.
    pub jsonrpc: Cow<'static, str>,
    /// Id of the request being answered.
    pub id: RequestId,
    /// Success payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl Response {
    /// Create a success response.
    #[must_use]
    pub fn success(id: impl Into<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    #[must_use]
    pub fn error(id: impl Into<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }

    /// Whether this response carries an error payload.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Split the response into its result or error payload.
    ///
    /// A response with neither payload is treated as an internal error.
    /// `"result": null` deserializes as an absent result and fails the same way.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match (self.error, self.result) {
            (Some(error), _) => Err(error),
            (None, Some(result)) => Ok(result),
            (None, None) => Err(JsonRpcError::new(
                codes::INTERNAL_ERROR,
                "response carried neither result nor error",
            )),
        }
    }
}

/// One-way message, no response expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Always `"2.0"`.
    pub jsonrpc: Cow<'static, str>,
    /// Notification method, e.g. `notifications/tools/list_changed`.
    pub method: Cow<'static, str>,
    /// Notification parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    /// Create a notification without parameters.
    #[must_use]
    pub fn new(method: impl Into<Cow<'static, str>>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            method: method.into(),
            params: None,
        }
    }

    /// Create a notification carrying parameters.
    #[must_use]
    pub fn with_params(method: impl Into<Cow<'static, str>>, params: Value) -> Self {
        Self {
            params: Some(params),
            ..Self::new(method)
        }
    }
}

/// Any frame on the wire.
///
/// Deserialization tries request, then response, then notification: a
/// request is the only kind with both `id` and `method`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    /// A request.
    Request(Request),
    /// A response.
    Response(Response),
    /// A notification.
    Notification(Notification),
}

impl Message {
    /// Method name for requests and notifications.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(r) => Some(&r.method),
            Self::Notification(n) => Some(&n.method),
            Self::Response(_) => None,
        }
    }

    /// Id for requests and responses.
    #[must_use]
    pub const fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(r) => Some(&r.id),
            Self::Response(r) => Some(&r.id),
            Self::Notification(_) => None,
        }
    }

    /// Returns the request, if this is one.
    #[must_use]
    pub const fn as_request(&self) -> Option<&Request> {
        match self {
            Self::Request(r) => Some(r),
            _ => None,
        }
    }

    /// Returns the response, if this is one.
    #[must_use]
    pub const fn as_response(&self) -> Option<&Response> {
        match self {
            Self::Response(r) => Some(r),
            _ => None,
        }
    }

    /// Returns the notification, if this is one.
    #[must_use]
    pub const fn as_notification(&self) -> Option<&Notification> {
        match self {
            Self::Notification(n) => Some(n),
            _ => None,
        }
    }

    /// Short label for log lines.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::Response(_) => "response",
            Self::Notification(_) => "notification",
        }
    }
}

impl From<Request> for Message {
    fn from(r: Request) -> Self {
        Self::Request(r)
    }
}

impl From<Response> for Message {
    fn from(r: Response) -> Self {
        Self::Response(r)
    }
}

impl From<Notification> for Message {
    fn from(n: Notification) -> Self {
        Self::Notification(n)
    }
}

/// Decode a JSON body that may hold a single message or a batch.
pub fn decode_messages(body: &str) -> Result<Vec<Message>, serde_json::Error> {
    let value: Value = serde_json::from_str(body)?;
    match value {
        Value::Array(items) => items.into_iter().map(serde_json::from_value).collect(),
        single => Ok(vec![serde_json::from_value(single)?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_omits_absent_params() {
        let request = Request::new("tools/list", 1u64);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}));
    }

    #[test]
    fn test_message_kind_detection() {
        let msg: Message =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#).unwrap();
        assert_eq!(msg.kind(), "request");
        assert_eq!(msg.id(), Some(&RequestId::Number(7)));

        let msg: Message =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":7,"result":{"ok":true}}"#).unwrap();
        assert_eq!(msg.kind(), "response");

        let msg: Message = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":"x","error":{"code":-32601,"message":"nope"}}"#,
        )
        .unwrap();
        assert!(msg.as_response().is_some_and(Response::is_error));

        let msg: Message = serde_json::from_str(
            r#"{"jsonrpc":"2.0","method":"notifications/tools/list_changed"}"#,
        )
        .unwrap();
        assert_eq!(msg.method(), Some("notifications/tools/list_changed"));
        assert!(msg.id().is_none());
    }

    #[test]
    fn test_into_result() {
        let ok = Response::success(1u64, json!({"tools": []}));
        assert_eq!(ok.into_result().unwrap(), json!({"tools": []}));

        let err = Response::error(2u64, JsonRpcError::method_not_found("resources/list"));
        assert_eq!(err.into_result().unwrap_err().code, codes::METHOD_NOT_FOUND);

        let null: Response =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":3,"result":null}"#).unwrap();
        assert!(null.into_result().is_err());
    }

    #[test]
    fn test_string_and_numeric_ids_differ() {
        assert_ne!(RequestId::from(1u64), RequestId::from("1"));
        assert_eq!(RequestId::from(5u64).to_string(), "5");
        assert_eq!(RequestId::from("abc").as_number(), None);
    }

    #[test]
    fn test_decode_batch() {
        let body = r#"[{"jsonrpc":"2.0","id":1,"result":{}},{"jsonrpc":"2.0","method":"n"}]"#;
        let messages = decode_messages(body).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].as_notification().is_some());

        let single = decode_messages(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#).unwrap();
        assert_eq!(single.len(), 1);
    }
}
