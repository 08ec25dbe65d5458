//! The client for one tool server.
//!
//! A [`Client`] owns a transport and everything layered on top of it: the
//! lifecycle state, request correlation, the discovery cache and the event
//! broadcast. Inbound traffic is handled by a single dispatch task per
//! connection, so responses, server requests and notifications are processed
//! in arrival order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Instant;

use async_lock::Mutex as AsyncMutex;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use toolbridge_core::capability::{
    InitializeRequest, InitializeResult, ServerCapabilities, ServerInfo, is_version_supported,
};
use toolbridge_core::error::{BridgeError, BridgeResult, JsonRpcError, codes};
use toolbridge_core::identity::ServerIdentity;
use toolbridge_core::protocol::{Message, Notification, Request, RequestId, Response};
use toolbridge_core::types::methods::{
    INITIALIZE, NOTIFICATION_INITIALIZED, NOTIFICATION_MESSAGE,
    NOTIFICATION_RESOURCES_LIST_CHANGED, NOTIFICATION_RESOURCES_UPDATED,
    NOTIFICATION_TOOLS_LIST_CHANGED, PING, RESOURCES_READ, TOOLS_CALL,
};
use toolbridge_core::types::{
    CallToolRequest, CallToolResult, ReadResourceRequest, ReadResourceResult, Resource,
    ResourceTemplate, ResourceUpdatedNotification, Tool,
};
use toolbridge_transport::{EventReceiver, Transport, TransportEvent};
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use crate::catalog::Catalog;
use crate::coerce::coerce_arguments;
use crate::config::ClientConfig;
use crate::discovery::Category;
use crate::event::ClientEvent;
use crate::pending::PendingRequests;
use crate::state::ClientState;

/// A tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Name of a tool in the client's catalog.
    pub name: String,
    /// Arguments object. `Value::Null` sends no arguments.
    pub arguments: Value,
}

impl ToolCall {
    /// Create a call with the given arguments.
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Create a call without arguments.
    pub fn without_arguments(name: impl Into<String>) -> Self {
        Self::new(name, Value::Null)
    }
}

/// Client for one tool server.
///
/// Cheap to clone; clones share the connection.
///
/// # Example
///
/// ```rust
/// use toolbridge_client::{Client, ClientConfig, ToolCall};
/// use toolbridge_transport::MemoryTransport;
///
/// # async fn example() -> Result<(), toolbridge_core::BridgeError> {
/// let (transport, _server) = MemoryTransport::pair();
/// let client = Client::new("calculator", ClientConfig::default(), transport);
///
/// client.connect().await?;
/// for tool in client.get_tools() {
///     println!("{}", tool.name);
/// }
/// let sum = client
///     .execute_tool(ToolCall::new("add", serde_json::json!({"a": 1, "b": 2})))
///     .await?;
/// client.disconnect().await;
/// # let _ = sum;
/// # Ok(())
/// # }
/// ```
pub struct Client<T: Transport + 'static> {
    inner: Arc<ClientInner<T>>,
}

impl<T: Transport + 'static> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(crate) struct ClientInner<T: Transport + 'static> {
    pub(crate) identity: ServerIdentity,
    pub(crate) config: ClientConfig,
    transport: T,
    state: RwLock<ClientState>,
    next_id: AtomicU64,
    pending: PendingRequests,
    pub(crate) catalog: RwLock<Catalog>,
    session: RwLock<Option<InitializeResult>>,
    events: broadcast::Sender<ClientEvent>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    /// Serializes discovery passes.
    pub(crate) discovery_lock: AsyncMutex<()>,
}

impl<T: Transport + 'static> Client<T> {
    /// Create a client. Nothing happens on the wire until [`connect`](Self::connect).
    pub fn new(identity: impl Into<ServerIdentity>, config: ClientConfig, transport: T) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(ClientInner {
                identity: identity.into(),
                config,
                transport,
                state: RwLock::new(ClientState::Idle),
                next_id: AtomicU64::new(1),
                pending: PendingRequests::new(),
                catalog: RwLock::new(Catalog::new()),
                session: RwLock::new(None),
                events,
                dispatcher: Mutex::new(None),
                discovery_lock: AsyncMutex::new(()),
            }),
        }
    }

    /// The server this client talks to.
    #[must_use]
    pub fn identity(&self) -> &ServerIdentity {
        &self.inner.identity
    }

    /// The client's configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ClientState {
        self.inner.state()
    }

    /// Whether the client is ready for tool calls.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.state() == ClientState::Ready
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Open the transport, perform the handshake and run discovery.
    ///
    /// Accepted only from `Idle` or `Disconnected`. A live client fails with
    /// [`BridgeError::AlreadyConnected`]; a failed one with
    /// [`BridgeError::InvalidState`] until [`disconnect`](Self::disconnect)
    /// is called.
    ///
    /// On failure the client is left in `Error` with an error event emitted.
    pub async fn connect(&self) -> BridgeResult<()> {
        let inner = &self.inner;
        {
            let mut state = inner.state.write().unwrap_or_else(|e| e.into_inner());
            match *state {
                current if current.can_connect() => *state = ClientState::Connecting,
                ClientState::Error => {
                    return Err(BridgeError::invalid_state("connect", ClientState::Error));
                }
                _ => return Err(BridgeError::AlreadyConnected),
            }
        }

        let started = Instant::now();
        let metadata = inner.transport.metadata();
        info!(
            server = %inner.identity,
            transport = %metadata.transport_type,
            remote = metadata.remote_addr.as_deref().unwrap_or("-"),
            "Connecting to tool server"
        );

        match inner.establish().await {
            Ok(server_info) => {
                if !inner.transition(&[ClientState::Handshaking], ClientState::Ready) {
                    debug!(server = %inner.identity, "Connection closed during discovery");
                    return Err(BridgeError::ConnectionClosed);
                }
                let tools = inner.catalog().tools().len();
                info!(
                    server = %inner.identity,
                    name = %server_info.name,
                    version = %server_info.version,
                    tools,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Connected to tool server"
                );
                inner.emit(ClientEvent::Connected { server_info });
                Ok(())
            }
            Err(e) => {
                error!(server = %inner.identity, error = %e, "Failed to connect to tool server");
                inner.transition(
                    &[ClientState::Connecting, ClientState::Handshaking],
                    ClientState::Error,
                );
                inner.emit(ClientEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Tear the connection down.
    ///
    /// Rejects every pending request with [`BridgeError::ConnectionClosed`],
    /// clears the caches and closes the transport. Never fails; calling it
    /// again is a no-op.
    pub async fn disconnect(&self) {
        self.inner.teardown(false).await;
    }

    // ------------------------------------------------------------------
    // Handshake results
    // ------------------------------------------------------------------

    /// Who answered the handshake.
    #[must_use]
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.inner.with_session(|s| s.server_info.clone())
    }

    /// What the server declared it supports.
    #[must_use]
    pub fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.inner.with_session(|s| s.capabilities.clone())
    }

    /// Protocol version the server chose.
    #[must_use]
    pub fn protocol_version(&self) -> Option<String> {
        self.inner.with_session(|s| s.protocol_version.clone())
    }

    /// Usage instructions the server supplied.
    #[must_use]
    pub fn instructions(&self) -> Option<String> {
        self.inner
            .with_session(|s| s.instructions.clone())
            .flatten()
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    /// Every discovered tool, ordered by name.
    #[must_use]
    pub fn get_tools(&self) -> Vec<Tool> {
        self.inner.catalog().tools()
    }

    /// One discovered tool.
    #[must_use]
    pub fn get_tool(&self, name: &str) -> Option<Tool> {
        self.inner.catalog().tool(name).cloned()
    }

    /// Every discovered resource, ordered by URI.
    #[must_use]
    pub fn get_resources(&self) -> Vec<Resource> {
        self.inner.catalog().resources()
    }

    /// Every discovered resource template.
    #[must_use]
    pub fn get_resource_templates(&self) -> Vec<ResourceTemplate> {
        self.inner.catalog().templates()
    }

    /// Re-run tool discovery now.
    pub async fn refresh_tools(&self) -> BridgeResult<Vec<Tool>> {
        self.inner.ensure_ready()?;
        Ok(self.inner.refresh_tools().await)
    }

    /// Re-run resource and template discovery now.
    pub async fn refresh_resources(&self) -> BridgeResult<Vec<Resource>> {
        self.inner.ensure_ready()?;
        Ok(self.inner.refresh_resources().await)
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Invoke a tool and return its flattened result.
    ///
    /// Arguments are normalized against the tool's input schema first (see
    /// [`coerce`](crate::coerce)). A result flagged `isError` becomes
    /// [`BridgeError::ToolExecution`].
    pub async fn execute_tool(&self, call: ToolCall) -> BridgeResult<Value> {
        let inner = &self.inner;
        inner.ensure_ready()?;
        let schema = inner
            .catalog()
            .tool(&call.name)
            .map(|tool| tool.input_schema.clone())
            .ok_or_else(|| BridgeError::UnknownTool {
                name: call.name.clone(),
            })?;

        let arguments = match coerce_arguments(&schema, call.arguments) {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(BridgeError::Protocol {
                    method: TOOLS_CALL.to_string(),
                    code: codes::INVALID_PARAMS,
                    message: format!(
                        "arguments for '{}' must be an object, got {}",
                        call.name,
                        json_kind(&other)
                    ),
                    data: None,
                });
            }
        };

        let started = Instant::now();
        let params = serde_json::to_value(CallToolRequest {
            name: call.name.clone(),
            arguments,
        })?;
        let result: CallToolResult = inner.request_as(TOOLS_CALL, Some(params)).await?;
        let output = result.flatten();
        debug!(
            tool = %call.name,
            is_error = result.is_error(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tool call finished"
        );

        if result.is_error() {
            return Err(BridgeError::tool_failed(
                call.name,
                result.text_summary(),
                output,
            ));
        }
        Ok(output)
    }

    /// Read a resource.
    pub async fn get_resource(&self, uri: impl Into<String>) -> BridgeResult<ReadResourceResult> {
        self.inner.ensure_ready()?;
        let params = serde_json::to_value(ReadResourceRequest { uri: uri.into() })?;
        self.inner.request_as(RESOURCES_READ, Some(params)).await
    }

    /// Check that the server is responsive.
    pub async fn ping(&self) -> BridgeResult<()> {
        self.inner.ensure_ready()?;
        self.inner.request(PING, None).await.map(|_| ())
    }

    /// Send an arbitrary request and wait for its result.
    pub async fn send_request(&self, method: &str, params: Option<Value>) -> BridgeResult<Value> {
        self.inner.ensure_ready()?;
        self.inner.request(method, params).await
    }

    /// Send a notification. No response is expected.
    pub async fn send_notification(&self, method: &str, params: Option<Value>) -> BridgeResult<()> {
        self.inner.ensure_ready()?;
        self.inner.notify(method, params).await
    }

    /// Number of requests awaiting a response.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Receive every event emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// Run `handler` on a spawned task for every event.
    ///
    /// The task ends when the client is dropped, or when the returned handle
    /// is aborted.
    pub fn on_event<F>(&self, handler: F) -> JoinHandle<()>
    where
        F: Fn(ClientEvent) + Send + 'static,
    {
        let mut events = self.subscribe();
        let identity = self.inner.identity.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => handler(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(server = %identity, skipped, "Event handler fell behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl<T: Transport + 'static> std::fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("identity", &self.inner.identity)
            .field("state", &self.inner.state())
            .field("pending", &self.inner.pending.len())
            .finish_non_exhaustive()
    }
}

impl<T: Transport + 'static> ClientInner<T> {
    pub(crate) fn state(&self) -> ClientState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Move to `to` if the current state is one of `from`.
    fn transition(&self, from: &[ClientState], to: ClientState) -> bool {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if !from.contains(&*state) {
            return false;
        }
        debug_assert!(state.can_transition_to(to), "{} -> {to}", *state);
        trace!(server = %self.identity, from = %*state, to = %to, "State transition");
        *state = to;
        true
    }

    fn ensure_ready(&self) -> BridgeResult<()> {
        match self.state() {
            ClientState::Ready => Ok(()),
            other => Err(BridgeError::not_ready(other)),
        }
    }

    pub(crate) fn catalog(&self) -> std::sync::RwLockReadGuard<'_, Catalog> {
        self.catalog.read().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn catalog_mut(&self) -> std::sync::RwLockWriteGuard<'_, Catalog> {
        self.catalog.write().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn with_session<R>(&self, f: impl FnOnce(&InitializeResult) -> R) -> Option<R> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(f)
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        trace!(server = %self.identity, event = event.kind(), "Emitting event");
        // No receivers is not an error.
        let _ = self.events.send(event);
    }

    // ------------------------------------------------------------------
    // Request plumbing
    // ------------------------------------------------------------------

    /// Send a request and wait for its response or its deadline.
    pub(crate) async fn request(&self, method: &str, params: Option<Value>) -> BridgeResult<Value> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let request = match params {
            Some(params) => Request::with_params(method.to_string(), id.clone(), params),
            None => Request::new(method.to_string(), id.clone()),
        };

        // Register before sending: over HTTP the response is delivered
        // before `send` returns.
        let mut rx = self.pending.register(id.clone(), method);
        let _guard = self.pending.guard(id.clone());
        let timeout = self.config.request_timeout;
        // One deadline covers both the send (an HTTP POST waits for the
        // answer) and the wait for the response.
        let deadline = tokio::time::Instant::now() + timeout;

        trace!(%id, method, "Sending request");
        match tokio::time::timeout_at(deadline, self.transport.send(request.into())).await {
            Ok(sent) => sent?,
            Err(_) => {
                if self.pending.expire(&id) {
                    debug!(%id, method, ?timeout, "Request timed out while sending");
                    return Err(BridgeError::timeout(method, &id, timeout));
                }
            }
        }

        let outcome = match tokio::time::timeout_at(deadline, &mut rx).await {
            Ok(outcome) => outcome,
            Err(_) => {
                if self.pending.expire(&id) {
                    debug!(%id, method, ?timeout, "Request timed out");
                    return Err(BridgeError::timeout(method, &id, timeout));
                }
                // The response landed as the deadline fired.
                rx.await
            }
        };
        outcome.unwrap_or(Err(BridgeError::ConnectionClosed))
    }

    pub(crate) async fn request_as<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> BridgeResult<R> {
        let value = self.request(method, params).await?;
        serde_json::from_value(value).map_err(|e| BridgeError::invalid_response(method, e))
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> BridgeResult<()> {
        let notification = match params {
            Some(params) => Notification::with_params(method.to_string(), params),
            None => Notification::new(method.to_string()),
        };
        trace!(method, "Sending notification");
        self.transport.send(notification.into()).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Connection setup and teardown
    // ------------------------------------------------------------------

    async fn establish(self: &Arc<Self>) -> BridgeResult<ServerInfo> {
        let events = self.transport.connect().await?;
        let span = info_span!("toolbridge.client", server = %self.identity);
        let handle = tokio::spawn(dispatch(Arc::downgrade(self), events).instrument(span));
        let stale = self
            .dispatcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle);
        if let Some(stale) = stale {
            stale.abort();
        }

        if !self.transition(&[ClientState::Connecting], ClientState::Handshaking) {
            return Err(BridgeError::ConnectionClosed);
        }
        let result = self.handshake().await?;
        let server_info = result.server_info.clone();
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = Some(result);

        self.notify(NOTIFICATION_INITIALIZED, None).await?;
        self.discover_all().await;
        Ok(server_info)
    }

    async fn handshake(&self) -> BridgeResult<InitializeResult> {
        let requested = &self.config.protocol_version;
        let params = serde_json::to_value(InitializeRequest::new(
            requested,
            self.config.client_info(),
            self.config.capabilities.clone(),
        ))?;

        let value = self
            .request(INITIALIZE, Some(params))
            .await
            .map_err(|e| BridgeError::handshake_with_source("initialize request failed", e))?;
        let result: InitializeResult = serde_json::from_value(value).map_err(|e| {
            BridgeError::handshake_with_source(
                "malformed initialize result",
                BridgeError::invalid_response(INITIALIZE, e),
            )
        })?;

        if !is_version_supported(&result.protocol_version) {
            warn!(
                server = %self.identity,
                requested = %requested,
                offered = %result.protocol_version,
                "Server chose an unsupported protocol version"
            );
            return Err(BridgeError::handshake_version_mismatch(
                requested.as_str(),
                result.protocol_version.as_str(),
            ));
        }
        if &result.protocol_version != requested {
            debug!(
                server = %self.identity,
                requested = %requested,
                negotiated = %result.protocol_version,
                "Server negotiated a different protocol version"
            );
        }
        Ok(result)
    }

    /// Release everything the connection holds. Idempotent.
    async fn teardown(&self, from_dispatcher: bool) {
        let previous = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            match *state {
                ClientState::Idle | ClientState::Disconnected => return,
                previous => {
                    *state = ClientState::Disconnected;
                    previous
                }
            }
        };

        let dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        // The dispatch task must not abort itself mid-teardown.
        if let Some(handle) = dispatcher {
            if !from_dispatcher {
                handle.abort();
            }
        }

        let rejected = self.pending.reject_all(|| BridgeError::ConnectionClosed);
        self.catalog_mut().clear();
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = None;

        if let Err(e) = self.transport.close().await {
            debug!(server = %self.identity, error = %e, "Error closing transport");
        }
        info!(
            server = %self.identity,
            from = %previous,
            rejected,
            remote_close = from_dispatcher,
            "Disconnected from tool server"
        );
        self.emit(ClientEvent::Disconnected);
    }

    // ------------------------------------------------------------------
    // Inbound traffic
    // ------------------------------------------------------------------

    fn handle_message(self: &Arc<Self>, message: Message) {
        match message {
            Message::Response(response) => {
                self.pending.resolve(response);
            }
            Message::Request(request) => self.answer_server_request(request),
            Message::Notification(notification) => self.handle_notification(notification),
        }
    }

    fn answer_server_request(self: &Arc<Self>, request: Request) {
        let response = if request.method == PING {
            Response::success(request.id, json!({}))
        } else {
            debug!(method = %request.method, "Rejecting unsupported server request");
            Response::error(request.id, JsonRpcError::method_not_found(&request.method))
        };

        // Sending may wait on the inbound channel this task drains.
        let inner = Arc::clone(self);
        tokio::spawn(
            async move {
                if let Err(e) = inner.transport.send(response.into()).await {
                    warn!(error = %e, "Failed to answer server request");
                }
            }
            .in_current_span(),
        );
    }

    fn handle_notification(self: &Arc<Self>, notification: Notification) {
        match &*notification.method {
            NOTIFICATION_TOOLS_LIST_CHANGED => self.spawn_refresh(Category::Tools),
            NOTIFICATION_RESOURCES_LIST_CHANGED => self.spawn_refresh(Category::Resources),
            NOTIFICATION_RESOURCES_UPDATED => {
                match notification
                    .params
                    .map(serde_json::from_value::<ResourceUpdatedNotification>)
                {
                    Some(Ok(update)) => self.emit(ClientEvent::ResourceUpdated { uri: update.uri }),
                    _ => warn!("Ignoring resource update without a uri"),
                }
            }
            NOTIFICATION_MESSAGE => {
                debug!(params = ?notification.params, "Server log message");
            }
            other => trace!(method = other, "Ignoring notification"),
        }
    }
}

impl<T: Transport + 'static> Drop for ClientInner<T> {
    fn drop(&mut self) {
        let handle = self
            .dispatcher
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

/// Drain one connection's inbound events.
///
/// Holds only a weak reference so a dropped client is not kept alive by its
/// own dispatcher.
async fn dispatch<T: Transport + 'static>(inner: Weak<ClientInner<T>>, mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        let Some(client) = inner.upgrade() else {
            return;
        };
        match event {
            TransportEvent::Message(message) => client.handle_message(message),
            TransportEvent::Error(e) => {
                warn!(error = %e, "Transport reported an error");
                client.emit(ClientEvent::Error {
                    message: e.to_string(),
                });
            }
            TransportEvent::Closed => {
                debug!("Transport closed");
                client.teardown(true).await;
                return;
            }
        }
    }

    if let Some(client) = inner.upgrade() {
        debug!("Transport event channel ended");
        client.teardown(true).await;
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use toolbridge_transport::{MemoryPeer, MemoryPeerSender, MemoryTransport};

    /// A server that answers the handshake and discovery, never answers
    /// `slow`, and reports every frame it receives.
    struct Scripted {
        seen: mpsc::UnboundedReceiver<Message>,
        sender: MemoryPeerSender,
    }

    impl Scripted {
        async fn next_request(&mut self, method: &str) -> Request {
            loop {
                let msg = tokio::time::timeout(Duration::from_secs(5), self.seen.recv())
                    .await
                    .expect("server saw nothing")
                    .expect("server stopped");
                if let Message::Request(request) = msg {
                    if request.method == method {
                        return request;
                    }
                }
            }
        }

        async fn next_response(&mut self) -> Response {
            loop {
                let msg = self.seen.recv().await.expect("server stopped");
                if let Message::Response(response) = msg {
                    return response;
                }
            }
        }
    }

    fn serve(mut peer: MemoryPeer, version: &'static str) -> Scripted {
        let sender = peer.sender();
        let (seen_tx, seen) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(msg) = peer.recv().await {
                let _ = seen_tx.send(msg.clone());
                let Message::Request(request) = msg else {
                    continue;
                };
                let reply = match &*request.method {
                    "initialize" => Some(Response::success(
                        request.id,
                        json!({
                            "protocolVersion": version,
                            "capabilities": {"tools": {"listChanged": true}},
                            "serverInfo": {"name": "scripted", "version": "0.0.1"},
                            "instructions": "be nice"
                        }),
                    )),
                    "tools/list" => Some(Response::success(
                        request.id,
                        json!({"tools": [{
                            "name": "add",
                            "inputSchema": {
                                "type": "object",
                                "properties": {"a": {"type": "number"}, "b": {"type": "number"}}
                            }
                        }]}),
                    )),
                    "resources/list" => Some(Response::error(
                        request.id,
                        JsonRpcError::method_not_found("resources/list"),
                    )),
                    "slow" => None,
                    _ => Some(Response::success(request.id, json!({}))),
                };
                if let Some(reply) = reply {
                    if peer.send(reply).await.is_err() {
                        break;
                    }
                }
            }
        });
        Scripted { seen, sender }
    }

    fn client_with(timeout: Duration) -> (Client<MemoryTransport>, MemoryPeer) {
        let (transport, peer) = MemoryTransport::pair();
        let config = ClientConfig {
            request_timeout: timeout,
            ..ClientConfig::default()
        };
        (Client::new("scripted", config, transport), peer)
    }

    async fn next_event(events: &mut broadcast::Receiver<ClientEvent>) -> ClientEvent {
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("no event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_connect_runs_handshake_then_discovery() {
        let (client, peer) = client_with(Duration::from_secs(5));
        let mut server = serve(peer, "2025-06-18");
        let mut events = client.subscribe();

        client.connect().await.unwrap();

        let init = server.next_request("initialize").await;
        let params = init.params.unwrap();
        assert_eq!(params["protocolVersion"], "2025-06-18");
        assert_eq!(params["clientInfo"]["name"], "toolbridge");

        assert_eq!(client.state(), ClientState::Ready);
        assert!(client.is_connected());
        assert_eq!(client.server_info().unwrap().name, "scripted");
        assert_eq!(client.instructions().as_deref(), Some("be nice"));
        assert_eq!(client.protocol_version().as_deref(), Some("2025-06-18"));
        assert_eq!(
            client.get_tools().iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            vec!["add"]
        );
        assert!(client.get_resources().is_empty());

        assert!(matches!(next_event(&mut events).await, ClientEvent::ToolsChanged(t) if t.len() == 1));
        assert!(matches!(
            next_event(&mut events).await,
            ClientEvent::ResourcesChanged { resources, templates } if resources.is_empty() && templates.is_empty()
        ));
        assert!(matches!(next_event(&mut events).await, ClientEvent::Connected { .. }));
    }

    #[tokio::test]
    async fn test_second_connect_fails_fast() {
        let (client, peer) = client_with(Duration::from_secs(5));
        let _server = serve(peer, "2025-06-18");
        client.connect().await.unwrap();

        assert!(matches!(
            client.connect().await,
            Err(BridgeError::AlreadyConnected)
        ));
        assert_eq!(client.state(), ClientState::Ready);
    }

    #[tokio::test]
    async fn test_unsupported_version_leaves_error_state() {
        let (client, peer) = client_with(Duration::from_secs(5));
        let _server = serve(peer, "1999-01-01");
        let mut events = client.subscribe();

        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, BridgeError::HandshakeFailed(_)), "{err:?}");
        assert_eq!(client.state(), ClientState::Error);
        assert!(matches!(next_event(&mut events).await, ClientEvent::Error { .. }));

        assert!(matches!(
            client.connect().await,
            Err(BridgeError::InvalidState { .. })
        ));

        client.disconnect().await;
        assert_eq!(client.state(), ClientState::Disconnected);
        assert!(matches!(next_event(&mut events).await, ClientEvent::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_late_response_is_ignored() {
        let (client, peer) = client_with(Duration::from_secs(1));
        let mut server = serve(peer, "2025-06-18");
        client.connect().await.unwrap();

        let err = client.send_request("slow", None).await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout { ref method, .. } if method == "slow"));
        assert_eq!(client.pending_requests(), 0);

        let slow = server.next_request("slow").await;
        server
            .sender
            .send(Response::success(slow.id, json!({"late": true})))
            .await
            .unwrap();

        client.ping().await.unwrap();
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_rejects_pending_requests() {
        let (client, peer) = client_with(Duration::from_secs(30));
        let mut server = serve(peer, "2025-06-18");
        client.connect().await.unwrap();
        let mut events = client.subscribe();

        let waiting = {
            let client = client.clone();
            tokio::spawn(async move { client.send_request("slow", None).await })
        };
        server.next_request("slow").await;
        assert_eq!(client.pending_requests(), 1);

        client.disconnect().await;
        assert_eq!(client.pending_requests(), 0);
        assert!(client.get_tools().is_empty());
        assert!(client.server_info().is_none());
        assert!(matches!(
            waiting.await.unwrap(),
            Err(BridgeError::ConnectionClosed)
        ));
        assert!(matches!(next_event(&mut events).await, ClientEvent::Disconnected));

        // Idempotent.
        client.disconnect().await;
        assert_eq!(client.state(), ClientState::Disconnected);
    }

    #[tokio::test]
    async fn test_server_requests_are_answered() {
        let (client, peer) = client_with(Duration::from_secs(5));
        let mut server = serve(peer, "2025-06-18");
        client.connect().await.unwrap();

        server
            .sender
            .send(Request::new("ping", "srv-1"))
            .await
            .unwrap();
        let pong = server.next_response().await;
        assert_eq!(pong.id, RequestId::from("srv-1"));
        assert_eq!(pong.result, Some(json!({})));

        server
            .sender
            .send(Request::new("sampling/createMessage", "srv-2"))
            .await
            .unwrap();
        let rejected = server.next_response().await;
        assert_eq!(rejected.error.map(|e| e.code), Some(codes::METHOD_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_remote_close_tears_down() {
        let (client, peer) = client_with(Duration::from_secs(5));
        let server = serve(peer, "2025-06-18");
        client.connect().await.unwrap();
        let mut events = client.subscribe();

        server.sender.close().await;

        assert!(matches!(next_event(&mut events).await, ClientEvent::Disconnected));
        assert_eq!(client.state(), ClientState::Disconnected);
        assert!(client.get_tools().is_empty());
    }

    #[tokio::test]
    async fn test_operations_require_ready() {
        let (client, _peer) = client_with(Duration::from_secs(5));
        assert!(matches!(
            client.execute_tool(ToolCall::without_arguments("add")).await,
            Err(BridgeError::NotReady { .. })
        ));
        assert!(matches!(client.ping().await, Err(BridgeError::NotReady { .. })));
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_arguments() {
        let (client, peer) = client_with(Duration::from_secs(5));
        let _server = serve(peer, "2025-06-18");
        client.connect().await.unwrap();

        assert!(matches!(
            client.execute_tool(ToolCall::without_arguments("divide")).await,
            Err(BridgeError::UnknownTool { name }) if name == "divide"
        ));
        let err = client
            .execute_tool(ToolCall::new("add", json!([1, 2])))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::INVALID_PARAMS);
    }
}
