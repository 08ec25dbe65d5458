//! JSON-RPC error codes seen on the wire.

/// Invalid JSON was received.
pub const PARSE_ERROR: i32 = -32700;

/// The JSON sent is not a valid request object.
pub const INVALID_REQUEST: i32 = -32600;

/// The method does not exist or the server does not implement it.
pub const METHOD_NOT_FOUND: i32 = -32601;

/// Invalid method parameters.
pub const INVALID_PARAMS: i32 = -32602;

/// Internal JSON-RPC error.
pub const INTERNAL_ERROR: i32 = -32603;

/// Start of the implementation-defined server error range.
pub const SERVER_ERROR_START: i32 = -32000;

/// End of the implementation-defined server error range.
pub const SERVER_ERROR_END: i32 = -32099;

/// A requested resource does not exist.
pub const RESOURCE_NOT_FOUND: i32 = -32002;

/// Whether `code` falls in the implementation-defined server range.
#[must_use]
pub const fn is_server_error(code: i32) -> bool {
    code <= SERVER_ERROR_START && code >= SERVER_ERROR_END
}
