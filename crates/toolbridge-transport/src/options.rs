//! Declarative transport selection.
//!
//! [`TransportOptions`] is the serializable description of how to reach a
//! server; [`AnyTransport`] is the transport built from it.
//!
//! ```rust
//! use toolbridge_transport::TransportOptions;
//!
//! let options: TransportOptions = serde_json::from_value(serde_json::json!({
//!     "kind": "host-process",
//!     "command": "npx -y @modelcontextprotocol/server-everything"
//! }))?;
//! assert!(matches!(options, TransportOptions::HostProcess { .. }));
//! # Ok::<(), serde_json::Error>(())
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use toolbridge_core::identity::ServerIdentity;
use toolbridge_core::protocol::Message;

use crate::error::TransportError;
use crate::host::{HostProcessTransport, ProcessHost, ProcessSpec};
use crate::traits::{EventReceiver, Transport, TransportMetadata};

#[cfg(feature = "http")]
use crate::http::{HttpTransport, HttpTransportConfig};

/// How to reach a tool server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransportOptions {
    /// A local process launched by a [`ProcessHost`].
    HostProcess {
        /// Program, or whole command line when `args` is empty.
        command: String,
        /// Arguments.
        #[serde(default)]
        args: Vec<String>,
        /// Environment overrides.
        #[serde(default)]
        env: HashMap<String, String>,
    },
    /// A streamable HTTP endpoint.
    Http {
        /// Endpoint URL.
        url: String,
        /// Extra request headers.
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

impl TransportOptions {
    /// Options for a host process.
    pub fn host_process(command: impl Into<String>) -> Self {
        Self::HostProcess {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    /// Options for an HTTP endpoint.
    pub fn http(url: impl Into<String>) -> Self {
        Self::Http {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    /// Short label of the transport kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::HostProcess { .. } => "host-process",
            Self::Http { .. } => "http",
        }
    }
}

/// A transport chosen at runtime from [`TransportOptions`].
pub enum AnyTransport {
    /// Host process transport.
    HostProcess(HostProcessTransport),
    /// HTTP transport.
    #[cfg(feature = "http")]
    Http(HttpTransport),
}

impl AnyTransport {
    /// Build the transport described by `options` for `server`.
    ///
    /// `host` is required for host-process options and ignored otherwise.
    pub fn from_options(
        server: &ServerIdentity,
        options: &TransportOptions,
        host: Option<Arc<dyn ProcessHost>>,
    ) -> Result<Self, TransportError> {
        match options {
            TransportOptions::HostProcess { command, args, env } => {
                let host = host.ok_or_else(|| {
                    TransportError::host(format!("no process host available for '{server}'"))
                })?;
                let spec = ProcessSpec {
                    command: command.clone(),
                    args: args.clone(),
                    env: env.clone(),
                };
                Ok(Self::HostProcess(HostProcessTransport::new(
                    server.clone(),
                    spec,
                    host,
                )))
            }
            #[cfg(feature = "http")]
            TransportOptions::Http { url, headers } => {
                let config = HttpTransportConfig::new(url.clone())
                    .with_headers(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
                Ok(Self::Http(HttpTransport::new(config)?))
            }
            #[cfg(not(feature = "http"))]
            TransportOptions::Http { .. } => Err(TransportError::connection(
                "HTTP transport requires the 'http' feature",
            )),
        }
    }
}

impl Transport for AnyTransport {
    async fn connect(&self) -> Result<EventReceiver, TransportError> {
        match self {
            Self::HostProcess(t) => t.connect().await,
            #[cfg(feature = "http")]
            Self::Http(t) => t.connect().await,
        }
    }

    async fn send(&self, msg: Message) -> Result<(), TransportError> {
        match self {
            Self::HostProcess(t) => t.send(msg).await,
            #[cfg(feature = "http")]
            Self::Http(t) => t.send(msg).await,
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        match self {
            Self::HostProcess(t) => t.close().await,
            #[cfg(feature = "http")]
            Self::Http(t) => t.close().await,
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            Self::HostProcess(t) => t.is_connected(),
            #[cfg(feature = "http")]
            Self::Http(t) => t.is_connected(),
        }
    }

    fn metadata(&self) -> TransportMetadata {
        match self {
            Self::HostProcess(t) => t.metadata(),
            #[cfg(feature = "http")]
            Self::Http(t) => t.metadata(),
        }
    }
}
