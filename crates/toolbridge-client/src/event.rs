//! Events a client broadcasts to its listeners.

use toolbridge_core::capability::ServerInfo;
use toolbridge_core::types::{Resource, ResourceTemplate, Tool};

/// Something listeners may want to react to.
///
/// Delivered through a `tokio::sync::broadcast` channel; slow listeners may
/// miss events and see `RecvError::Lagged`.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Handshake and discovery finished; the client is ready.
    Connected {
        /// Who answered the handshake.
        server_info: ServerInfo,
    },
    /// The connection was torn down.
    Disconnected,
    /// Connection setup failed, or the transport reported a fault.
    Error {
        /// Human-readable description.
        message: String,
    },
    /// The tool cache was replaced. Carries the full new set.
    ToolsChanged(Vec<Tool>),
    /// The resource and template caches were replaced.
    ResourcesChanged {
        /// Every cached resource.
        resources: Vec<Resource>,
        /// Every cached template.
        templates: Vec<ResourceTemplate>,
    },
    /// The server reported that one resource changed.
    ResourceUpdated {
        /// The resource's URI.
        uri: String,
    },
}

impl ClientEvent {
    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Disconnected => "disconnected",
            Self::Error { .. } => "error",
            Self::ToolsChanged(_) => "tools_changed",
            Self::ResourcesChanged { .. } => "resources_changed",
            Self::ResourceUpdated { .. } => "resource_updated",
        }
    }
}
