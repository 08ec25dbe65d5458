//! Host-process transport.
//!
//! Tool servers launched as child processes are owned by a [`ProcessHost`],
//! not by the client. The host starts and stops processes by server identity
//! and publishes what each process says as [`HostEvent`]s. A
//! [`HostProcessTransport`] subscribes to one identity's events, asks the
//! host to start the process, and translates host events into
//! [`TransportEvent`]s.
//!
//! [`LocalProcessHost`](crate::process::LocalProcessHost) is the bundled host
//! that runs processes with `tokio::process`. Embedders with their own
//! process supervisor implement [`ProcessHost`] instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_lock::Mutex as AsyncMutex;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use toolbridge_core::identity::ServerIdentity;
use toolbridge_core::protocol::Message;

use crate::error::TransportError;
use crate::traits::{
    EVENT_CHANNEL_CAPACITY, EventReceiver, EventSender, Transport, TransportEvent,
    TransportMetadata,
};

/// What a hosted process reported.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// A stdout line that parsed as a JSON object.
    Message(Value),
    /// A stdout line that was not a protocol frame.
    Stdout(String),
    /// A stderr line.
    Stderr(String),
    /// The process failed or exited unsuccessfully.
    Error(String),
    /// The process is gone. Nothing follows this event.
    Stopped,
}

/// Receiving end of one identity's host events.
pub type HostEventReceiver = mpsc::UnboundedReceiver<HostEvent>;

/// How to launch a server process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    /// Program to run, or a whole command line when `args` is empty.
    pub command: String,
    /// Arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment overrides layered on the parent environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl ProcessSpec {
    /// Create a spec for a program.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Add an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Resolve the program and its arguments.
    ///
    /// With no explicit arguments the command is split on whitespace, so
    /// `"node server.js"` runs `node` with `server.js`.
    pub fn program(&self) -> Result<(String, Vec<String>), TransportError> {
        if self.args.is_empty() {
            let mut parts = self.command.split_whitespace().map(str::to_string);
            let program = parts
                .next()
                .ok_or_else(|| TransportError::host("empty command"))?;
            return Ok((program, parts.collect()));
        }
        let program = self.command.trim();
        if program.is_empty() {
            return Err(TransportError::host("empty command"));
        }
        Ok((program.to_string(), self.args.clone()))
    }
}

/// Owner of server processes, addressed by server identity.
///
/// Subscriptions and processes are independent: subscribe before starting
/// so no early output is missed, and unsubscribe after stopping.
#[async_trait]
pub trait ProcessHost: Send + Sync {
    /// Register interest in an identity's events.
    async fn subscribe(&self, server: &ServerIdentity)
    -> Result<HostEventReceiver, TransportError>;

    /// Drop the subscription for an identity.
    async fn unsubscribe(&self, server: &ServerIdentity);

    /// Launch the process for an identity.
    async fn start(&self, server: &ServerIdentity, spec: &ProcessSpec)
    -> Result<(), TransportError>;

    /// Write one serialized frame to the process.
    async fn send(&self, server: &ServerIdentity, payload: String) -> Result<(), TransportError>;

    /// Stop the process for an identity.
    async fn stop(&self, server: &ServerIdentity) -> Result<(), TransportError>;
}

/// Transport to a server process owned by a [`ProcessHost`].
pub struct HostProcessTransport {
    server: ServerIdentity,
    spec: ProcessSpec,
    host: Arc<dyn ProcessHost>,
    connected: AtomicBool,
    forwarder: AsyncMutex<Option<JoinHandle<()>>>,
}

impl HostProcessTransport {
    /// Create a transport for `server`, launched from `spec` by `host`.
    pub fn new(server: ServerIdentity, spec: ProcessSpec, host: Arc<dyn ProcessHost>) -> Self {
        Self {
            server,
            spec,
            host,
            connected: AtomicBool::new(false),
            forwarder: AsyncMutex::new(None),
        }
    }

    /// The identity this transport addresses.
    #[must_use]
    pub fn server(&self) -> &ServerIdentity {
        &self.server
    }
}

impl Transport for HostProcessTransport {
    async fn connect(&self) -> Result<EventReceiver, TransportError> {
        if self.connected.swap(true, Ordering::AcqRel) {
            return Err(TransportError::AlreadyConnected);
        }

        let host_events = match self.host.subscribe(&self.server).await {
            Ok(rx) => rx,
            Err(e) => {
                self.connected.store(false, Ordering::Release);
                return Err(e);
            }
        };

        if let Err(e) = self.host.start(&self.server, &self.spec).await {
            self.host.unsubscribe(&self.server).await;
            self.connected.store(false, Ordering::Release);
            return Err(e);
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let handle = tokio::spawn(forward_host_events(self.server.clone(), host_events, tx));
        if let Some(stale) = self.forwarder.lock().await.replace(handle) {
            stale.abort();
        }

        tracing::debug!(server = %self.server, command = %self.spec.command, "Host process started");
        Ok(rx)
    }

    async fn send(&self, msg: Message) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let payload = serde_json::to_string(&msg)?;
        self.host.send(&self.server, payload).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        if let Some(handle) = self.forwarder.lock().await.take() {
            handle.abort();
        }

        let stopped = self.host.stop(&self.server).await;
        self.host.unsubscribe(&self.server).await;
        if let Err(e) = stopped {
            tracing::debug!(server = %self.server, error = %e, "Host stop failed during close");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn metadata(&self) -> TransportMetadata {
        TransportMetadata::new("host-process").remote_addr(self.server.as_str())
    }
}

/// Translate one identity's host events until the process stops.
async fn forward_host_events(
    server: ServerIdentity,
    mut host_events: HostEventReceiver,
    tx: EventSender,
) {
    while let Some(event) = host_events.recv().await {
        let forwarded = match event {
            HostEvent::Message(value) => match serde_json::from_value::<Message>(value) {
                Ok(msg) => TransportEvent::Message(msg),
                Err(e) => {
                    tracing::warn!(server = %server, error = %e, "Dropping malformed frame from host");
                    continue;
                }
            },
            HostEvent::Stdout(line) => {
                tracing::debug!(server = %server, line = %line, "Server stdout");
                continue;
            }
            HostEvent::Stderr(line) => {
                tracing::debug!(server = %server, line = %line, "Server stderr");
                continue;
            }
            HostEvent::Error(message) => TransportEvent::Error(TransportError::Host { message }),
            HostEvent::Stopped => {
                let _ = tx.send(TransportEvent::Closed).await;
                return;
            }
        };
        if tx.send(forwarded).await.is_err() {
            return;
        }
    }

    // The host dropped the subscription without a stop event.
    let _ = tx.send(TransportEvent::Closed).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    /// Host that records calls and lets the test push events.
    #[derive(Default)]
    struct RecordingHost {
        calls: Mutex<Vec<String>>,
        sender: Mutex<Option<mpsc::UnboundedSender<HostEvent>>>,
        fail_start: bool,
    }

    impl RecordingHost {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn emit(&self, event: HostEvent) {
            if let Some(tx) = self.sender.lock().unwrap().as_ref() {
                let _ = tx.send(event);
            }
        }
    }

    #[async_trait]
    impl ProcessHost for RecordingHost {
        async fn subscribe(
            &self,
            server: &ServerIdentity,
        ) -> Result<HostEventReceiver, TransportError> {
            self.record(format!("subscribe {server}"));
            let (tx, rx) = mpsc::unbounded_channel();
            *self.sender.lock().unwrap() = Some(tx);
            Ok(rx)
        }

        async fn unsubscribe(&self, server: &ServerIdentity) {
            self.record(format!("unsubscribe {server}"));
            self.sender.lock().unwrap().take();
        }

        async fn start(
            &self,
            server: &ServerIdentity,
            spec: &ProcessSpec,
        ) -> Result<(), TransportError> {
            self.record(format!("start {server} {}", spec.command));
            if self.fail_start {
                return Err(TransportError::host("spawn failed"));
            }
            Ok(())
        }

        async fn send(&self, server: &ServerIdentity, payload: String) -> Result<(), TransportError> {
            self.record(format!("send {server} {payload}"));
            Ok(())
        }

        async fn stop(&self, server: &ServerIdentity) -> Result<(), TransportError> {
            self.record(format!("stop {server}"));
            Err(TransportError::host("not running"))
        }
    }

    fn transport(host: &Arc<RecordingHost>) -> HostProcessTransport {
        HostProcessTransport::new(
            ServerIdentity::new("files"),
            ProcessSpec::new("files-server"),
            Arc::clone(host) as Arc<dyn ProcessHost>,
        )
    }

    #[test]
    fn test_program_splits_bare_command() {
        let spec = ProcessSpec::new("node  server.js --stdio");
        assert_eq!(
            spec.program().unwrap(),
            (
                "node".to_string(),
                vec!["server.js".to_string(), "--stdio".to_string()]
            )
        );

        let explicit = ProcessSpec::new("my server").arg("--flag");
        assert_eq!(
            explicit.program().unwrap(),
            ("my server".to_string(), vec!["--flag".to_string()])
        );

        assert!(ProcessSpec::new("   ").program().is_err());
    }

    #[tokio::test]
    async fn test_connect_subscribes_before_start() {
        let host = Arc::new(RecordingHost::default());
        let transport = transport(&host);

        let _events = transport.connect().await.unwrap();
        assert!(transport.is_connected());
        assert_eq!(
            host.calls(),
            vec!["subscribe files".to_string(), "start files files-server".to_string()]
        );
        assert!(matches!(
            transport.connect().await,
            Err(TransportError::AlreadyConnected)
        ));
    }

    #[tokio::test]
    async fn test_failed_start_unsubscribes() {
        let host = Arc::new(RecordingHost {
            fail_start: true,
            ..RecordingHost::default()
        });
        let transport = transport(&host);

        assert!(matches!(
            transport.connect().await,
            Err(TransportError::Host { .. })
        ));
        assert!(!transport.is_connected());
        assert_eq!(host.calls().last().map(String::as_str), Some("unsubscribe files"));
    }

    #[tokio::test]
    async fn test_host_events_are_translated() {
        let host = Arc::new(RecordingHost::default());
        let transport = transport(&host);
        let mut events = transport.connect().await.unwrap();

        host.emit(HostEvent::Stderr("booting".into()));
        host.emit(HostEvent::Message(json!({"jsonrpc": "2.0", "id": 1, "result": {}})));
        host.emit(HostEvent::Error("exit status 1".into()));
        host.emit(HostEvent::Stopped);

        assert!(matches!(
            events.recv().await,
            Some(TransportEvent::Message(Message::Response(_)))
        ));
        assert!(matches!(
            events.recv().await,
            Some(TransportEvent::Error(TransportError::Host { ref message })) if message == "exit status 1"
        ));
        assert!(matches!(events.recv().await, Some(TransportEvent::Closed)));
    }

    #[tokio::test]
    async fn test_send_and_close() {
        let host = Arc::new(RecordingHost::default());
        let transport = transport(&host);

        assert!(matches!(
            transport.send(Message::from(toolbridge_core::Request::new("ping", 1u64))).await,
            Err(TransportError::NotConnected)
        ));

        let _events = transport.connect().await.unwrap();
        transport
            .send(toolbridge_core::Request::new("ping", 1u64).into())
            .await
            .unwrap();

        // Stop failure is swallowed.
        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(!transport.is_connected());

        let calls = host.calls();
        assert!(calls[2].starts_with("send files {"));
        assert_eq!(
            calls[3..].to_vec(),
            vec!["stop files".to_string(), "unsubscribe files".to_string()]
        );
    }
}
