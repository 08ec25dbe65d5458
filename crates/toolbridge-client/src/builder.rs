//! Client builder for fluent construction.
//!
//! The [`ClientBuilder`] assembles a [`ClientConfig`] and pairs it with a
//! transport, either one the caller built or one described by
//! [`TransportOptions`].

use std::sync::Arc;
use std::time::Duration;

use toolbridge_core::capability::ClientCapabilities;
use toolbridge_core::error::BridgeResult;
use toolbridge_core::identity::ServerIdentity;
use toolbridge_transport::{AnyTransport, ProcessHost, Transport, TransportOptions};

use crate::client::Client;
use crate::config::{ClientConfig, ServerConfig};

/// Builder for constructing clients.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use toolbridge_client::ClientBuilder;
/// use toolbridge_transport::{LocalProcessHost, TransportOptions};
///
/// # async fn example() -> Result<(), toolbridge_core::BridgeError> {
/// let client = ClientBuilder::new("files")
///     .name("my-agent")
///     .version("1.0.0")
///     .request_timeout(std::time::Duration::from_secs(10))
///     .build_with_options(
///         &TransportOptions::host_process("files-server --root /srv"),
///         Some(Arc::new(LocalProcessHost::new())),
///     )?;
/// client.connect().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    identity: ServerIdentity,
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a builder for the server named `identity`.
    pub fn new(identity: impl Into<ServerIdentity>) -> Self {
        Self {
            identity: identity.into(),
            config: ClientConfig::default(),
        }
    }

    /// Start from an existing configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the client name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.client_name = name.into();
        self
    }

    /// Set the client version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.client_version = version.into();
        self
    }

    /// Set the per-request deadline.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the protocol version requested in the handshake.
    #[must_use]
    pub fn protocol_version(mut self, version: impl Into<String>) -> Self {
        self.config.protocol_version = version.into();
        self
    }

    /// Set the event channel capacity.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Enable roots capability.
    ///
    /// When enabled, the client tells the server it can expose file system roots.
    #[must_use]
    pub fn with_roots(mut self) -> Self {
        self.config.capabilities = self.config.capabilities.with_roots();
        self
    }

    /// Set custom capabilities.
    #[must_use]
    pub fn capabilities(mut self, capabilities: ClientCapabilities) -> Self {
        self.config.capabilities = capabilities;
        self
    }

    /// Build an unconnected client over `transport`.
    pub fn build<T: Transport + 'static>(self, transport: T) -> Client<T> {
        Client::new(self.identity, self.config, transport)
    }

    /// Build the transport described by `options`, then the client.
    ///
    /// `host` is needed for host-process servers only.
    pub fn build_with_options(
        self,
        options: &TransportOptions,
        host: Option<Arc<dyn ProcessHost>>,
    ) -> BridgeResult<Client<AnyTransport>> {
        let transport = AnyTransport::from_options(&self.identity, options, host)?;
        Ok(self.build(transport))
    }

    /// Build and connect.
    ///
    /// # Errors
    ///
    /// Returns an error if the handshake fails or the transport encounters an error.
    pub async fn connect<T: Transport + 'static>(self, transport: T) -> BridgeResult<Client<T>> {
        let client = self.build(transport);
        client.connect().await?;
        Ok(client)
    }
}

impl ServerConfig {
    /// Build a client for this server.
    pub fn client(
        &self,
        config: ClientConfig,
        host: Option<Arc<dyn ProcessHost>>,
    ) -> BridgeResult<Client<AnyTransport>> {
        ClientBuilder::new(self.identity.clone())
            .config(config)
            .build_with_options(&self.transport, host)
    }
}
