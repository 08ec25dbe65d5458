//! Client and server configuration.
//!
//! Both types deserialize from the JSON an embedding application keeps in its
//! settings:
//!
//! ```rust
//! use toolbridge_client::config::{ClientConfig, ServerConfig};
//!
//! let server: ServerConfig = serde_json::from_value(serde_json::json!({
//!     "identity": "github",
//!     "transport": {"kind": "http", "url": "https://tools.example.com/mcp"}
//! }))?;
//! assert_eq!(server.identity.as_str(), "github");
//!
//! let client: ClientConfig = serde_json::from_value(serde_json::json!({
//!     "request_timeout_ms": 5000
//! }))?;
//! assert_eq!(client.request_timeout.as_secs(), 5);
//! # Ok::<(), serde_json::Error>(())
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use toolbridge_core::capability::{ClientCapabilities, ClientInfo, PROTOCOL_VERSION};
use toolbridge_core::identity::ServerIdentity;
use toolbridge_transport::TransportOptions;

/// Default deadline for one request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Settings shared by every connection a client makes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Name announced in the handshake.
    pub client_name: String,
    /// Version announced in the handshake.
    pub client_version: String,
    /// Deadline applied to each request individually.
    #[serde(rename = "request_timeout_ms", with = "duration_ms")]
    pub request_timeout: Duration,
    /// Protocol version requested in the handshake.
    pub protocol_version: String,
    /// Buffer size of the event broadcast channel.
    pub event_capacity: usize,
    /// Capabilities declared to the server.
    pub capabilities: ClientCapabilities,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_name: "toolbridge".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            protocol_version: PROTOCOL_VERSION.to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            capabilities: ClientCapabilities::default(),
        }
    }
}

impl ClientConfig {
    /// Identity announced in the handshake.
    #[must_use]
    pub fn client_info(&self) -> ClientInfo {
        ClientInfo::new(&self.client_name, &self.client_version)
    }
}

/// One configured tool server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Key naming this server.
    pub identity: ServerIdentity,
    /// How to reach it.
    pub transport: TransportOptions,
}

impl ServerConfig {
    /// Create a server configuration.
    pub fn new(identity: impl Into<ServerIdentity>, transport: TransportOptions) -> Self {
        Self {
            identity: identity.into(),
            transport,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
