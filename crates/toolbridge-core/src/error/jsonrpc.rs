//! The error object carried in a JSON-RPC response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::codes;

/// A JSON-RPC error object: `{code, message, data?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i32,
    /// Human-readable message from the server.
    pub message: String,
    /// Optional structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create an error object with the given code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// A "method not found" error (-32601) naming the method.
    pub fn method_not_found(method: impl AsRef<str>) -> Self {
        Self::new(
            codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", method.as_ref()),
        )
    }

    /// An "invalid params" error (-32602).
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, message)
    }

    /// An "internal error" (-32603).
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL_ERROR, message)
    }

    /// Attach a structured payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_is_optional_on_the_wire() {
        let err: JsonRpcError =
            serde_json::from_str(r#"{"code":-32602,"message":"bad"}"#).unwrap();
        assert_eq!(err, JsonRpcError::invalid_params("bad"));

        let json = serde_json::to_string(&JsonRpcError::internal_error("boom")).unwrap();
        assert!(!json.contains("data"));
    }

    #[test]
    fn test_display() {
        let err = JsonRpcError::method_not_found("resources/list");
        assert_eq!(err.to_string(), "[-32601] Method not found: resources/list");
    }
}
