//! HTTP transport configuration types and constants.

use std::time::Duration;

use toolbridge_core::capability::PROTOCOL_VERSION;

use crate::error::TransportError;

/// Header carrying the negotiated protocol version.
///
/// HTTP/2 requires lowercase header names; HTTP/1.1 is case-insensitive.
pub const MCP_PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// Header carrying the server-issued session id.
pub const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";

/// Header used to resume an event stream.
pub(crate) const LAST_EVENT_ID_HEADER: &str = "last-event-id";

/// Default maximum message size (16 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Endpoint that receives every POST.
    pub base_url: String,
    /// Session id to resume, if any.
    pub session_id: Option<String>,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Per-request timeout for POST and DELETE. The push stream has none.
    pub request_timeout: Duration,
    /// Extra headers sent on every request.
    pub headers: Vec<(String, String)>,
    /// Value of the protocol version header.
    pub protocol_version: String,
    /// Maximum message size in bytes, in either direction.
    pub max_message_size: usize,
    /// Whether to try opening the server push stream.
    pub push_stream: bool,
}

impl HttpTransportConfig {
    /// Create a configuration for an endpoint.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            session_id: None,
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            headers: Vec::new(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            push_stream: true,
        }
    }

    /// Set the maximum message size.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the session id to resume.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Add a custom header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add several custom headers.
    #[must_use]
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the protocol version header value.
    #[must_use]
    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Use request/response mode only.
    #[must_use]
    pub const fn without_push_stream(mut self) -> Self {
        self.push_stream = false;
        self
    }

    /// Check that the endpoint is an absolute `http` or `https` URL.
    pub fn validate(&self) -> Result<url::Url, TransportError> {
        let url = url::Url::parse(&self.base_url).map_err(|e| {
            TransportError::connection(format!("invalid endpoint '{}': {e}", self.base_url))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(TransportError::connection(format!(
                "unsupported scheme '{other}' in endpoint '{}'",
                self.base_url
            ))),
        }
    }
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080/mcp")
    }
}
