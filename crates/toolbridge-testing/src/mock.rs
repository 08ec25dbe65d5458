//! Mock tool servers for testing.
//!
//! A [`MockServer`] answers the protocol from in-memory tool, resource and
//! template definitions. Serve it over a [`MemoryPeer`] with
//! [`MockServer::serve`], or over HTTP with `MockServer::serve_http` (feature
//! `http`). Either way the returned handle records every frame the server
//! received and can push notifications.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use toolbridge_core::capability::{PROTOCOL_VERSION, ServerCapabilities, ServerInfo};
use toolbridge_core::error::{JsonRpcError, codes};
use toolbridge_core::protocol::{Message, Notification, Request, Response};
use toolbridge_core::types::methods::{
    INITIALIZE, NOTIFICATION_TOOLS_LIST_CHANGED, PING, RESOURCES_LIST, RESOURCES_READ,
    RESOURCES_TEMPLATES_LIST, TOOLS_CALL, TOOLS_LIST,
};
use toolbridge_core::types::{
    CallToolRequest, CallToolResult, Content, ReadResourceRequest, Resource, ResourceContents,
    ResourceTemplate, Tool,
};
use toolbridge_transport::{MemoryPeer, MemoryPeerSender};

/// Type of response a mock tool should return.
#[derive(Clone)]
pub enum MockResponse {
    /// Return a single text part.
    Text(String),
    /// Return structured content with no parts.
    Json(Value),
    /// Return the given parts.
    Parts(Vec<Content>),
    /// Return a result flagged `isError`.
    Error(String),
    /// Compute the result from the arguments.
    Dynamic(Arc<dyn Fn(Value) -> CallToolResult + Send + Sync>),
}

/// A mock tool with configurable behavior.
#[derive(Clone)]
pub struct MockTool {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: Option<String>,
    /// Input schema.
    pub input_schema: Value,
    /// Response to return.
    pub response: MockResponse,
    /// How long to wait before answering.
    pub delay: Duration,
}

impl MockTool {
    /// Create a new mock tool.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: json!({"type": "object", "properties": {}}),
            response: MockResponse::Text("OK".to_string()),
            delay: Duration::ZERO,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the input schema.
    #[must_use]
    pub fn input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Set the tool to return a text response.
    #[must_use]
    pub fn returns_text(mut self, text: impl Into<String>) -> Self {
        self.response = MockResponse::Text(text.into());
        self
    }

    /// Set the tool to return structured content.
    #[must_use]
    pub fn returns_json(mut self, json: Value) -> Self {
        self.response = MockResponse::Json(json);
        self
    }

    /// Set the tool to return several parts.
    #[must_use]
    pub fn returns_parts(mut self, parts: Vec<Content>) -> Self {
        self.response = MockResponse::Parts(parts);
        self
    }

    /// Set the tool to report failure.
    #[must_use]
    pub fn returns_error(mut self, message: impl Into<String>) -> Self {
        self.response = MockResponse::Error(message.into());
        self
    }

    /// Set a dynamic handler.
    #[must_use]
    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(Value) -> CallToolResult + Send + Sync + 'static,
    {
        self.response = MockResponse::Dynamic(Arc::new(handler));
        self
    }

    /// Answer only after `delay`.
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Convert to a Tool definition.
    #[must_use]
    pub fn to_tool(&self) -> Tool {
        let tool = Tool::new(&self.name).input_schema(self.input_schema.clone());
        match &self.description {
            Some(description) => tool.description(description),
            None => tool,
        }
    }

    /// Call the tool.
    #[must_use]
    pub fn call(&self, args: Value) -> CallToolResult {
        match &self.response {
            MockResponse::Text(text) => CallToolResult::text(text),
            MockResponse::Json(value) => CallToolResult {
                structured_content: Some(value.clone()),
                ..CallToolResult::default()
            },
            MockResponse::Parts(parts) => CallToolResult {
                content: parts.clone(),
                ..CallToolResult::default()
            },
            MockResponse::Error(message) => CallToolResult::error(message),
            MockResponse::Dynamic(f) => f(args),
        }
    }
}

/// A mock resource.
#[derive(Debug, Clone)]
pub struct MockResource {
    /// Resource URI.
    pub uri: String,
    /// Resource name.
    pub name: String,
    /// MIME type.
    pub mime_type: Option<String>,
    /// Resource content.
    pub content: String,
}

impl MockResource {
    /// Create a new mock resource.
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            mime_type: None,
            content: String::new(),
        }
    }

    /// Set the MIME type.
    #[must_use]
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Set the content.
    #[must_use]
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Convert to a Resource definition.
    #[must_use]
    pub fn to_resource(&self) -> Resource {
        let resource = Resource::new(&self.uri, &self.name);
        match &self.mime_type {
            Some(mime_type) => resource.mime_type(mime_type),
            None => resource,
        }
    }

    /// Get the resource contents.
    #[must_use]
    pub fn to_contents(&self) -> ResourceContents {
        ResourceContents {
            mime_type: self.mime_type.clone(),
            ..ResourceContents::text(&self.uri, &self.content)
        }
    }
}

/// Builder for constructing mock servers.
pub struct MockServerBuilder {
    name: String,
    version: String,
    protocol_version: String,
    instructions: Option<String>,
    tools: Vec<MockTool>,
    resources: Vec<MockResource>,
    templates: Vec<ResourceTemplate>,
    page_size: Option<usize>,
    unsupported: HashSet<String>,
    failing: HashMap<String, JsonRpcError>,
    silent: HashSet<String>,
}

impl Default for MockServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockServerBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "mock-server".to_string(),
            version: "1.0.0".to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            instructions: None,
            tools: Vec::new(),
            resources: Vec::new(),
            templates: Vec::new(),
            page_size: None,
            unsupported: HashSet::new(),
            failing: HashMap::new(),
            silent: HashSet::new(),
        }
    }

    /// Set the server name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the server version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Answer `initialize` with this protocol version.
    #[must_use]
    pub fn protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Include usage instructions in the handshake.
    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Add a mock tool.
    #[must_use]
    pub fn tool(mut self, tool: MockTool) -> Self {
        self.tools.push(tool);
        self
    }

    /// Add multiple mock tools.
    #[must_use]
    pub fn tools(mut self, tools: impl IntoIterator<Item = MockTool>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Add a mock resource.
    #[must_use]
    pub fn resource(mut self, resource: MockResource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Add multiple mock resources.
    #[must_use]
    pub fn resources(mut self, resources: impl IntoIterator<Item = MockResource>) -> Self {
        self.resources.extend(resources);
        self
    }

    /// Add a resource template.
    #[must_use]
    pub fn template(mut self, template: ResourceTemplate) -> Self {
        self.templates.push(template);
        self
    }

    /// Split listings into pages of `size` items.
    #[must_use]
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size.max(1));
        self
    }

    /// Answer `method` with "method not found".
    #[must_use]
    pub fn unsupported(mut self, method: impl Into<String>) -> Self {
        self.unsupported.insert(method.into());
        self
    }

    /// Answer `method` with the given error.
    #[must_use]
    pub fn fail_method(mut self, method: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        self.failing
            .insert(method.into(), JsonRpcError::new(code, message));
        self
    }

    /// Never answer `method`.
    #[must_use]
    pub fn silent(mut self, method: impl Into<String>) -> Self {
        self.silent.insert(method.into());
        self
    }

    /// Build the mock server.
    #[must_use]
    pub fn build(self) -> MockServer {
        MockServer {
            state: Arc::new(MockState {
                info: ServerInfo::new(self.name, self.version),
                protocol_version: self.protocol_version,
                instructions: self.instructions,
                tools: RwLock::new(self.tools),
                resources: self.resources,
                templates: self.templates,
                page_size: self.page_size,
                unsupported: self.unsupported,
                failing: self.failing,
                silent: self.silent,
                received: Mutex::new(Vec::new()),
                seen: Notify::new(),
            }),
        }
    }
}

/// A mock tool server.
#[derive(Clone)]
pub struct MockServer {
    state: Arc<MockState>,
}

impl MockServer {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::new()
    }

    pub(crate) fn shared_state(&self) -> Arc<MockState> {
        Arc::clone(&self.state)
    }

    /// Compute the answer to one request, and how long to wait before
    /// sending it. `None` means the request is never answered.
    #[must_use]
    pub fn handle(&self, request: Request) -> Option<(Response, Duration)> {
        self.state.handle(request)
    }

    /// Serve the protocol over the server half of a memory transport.
    pub fn serve(self, mut peer: MemoryPeer) -> MockHandle {
        let sender = peer.sender();
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            while let Some(msg) = peer.recv().await {
                state.record(msg.clone());
                let Message::Request(request) = msg else {
                    continue;
                };
                let Some((response, delay)) = state.handle(request) else {
                    continue;
                };
                let sender = peer.sender();
                if delay.is_zero() {
                    if sender.send(response).await.is_err() {
                        break;
                    }
                } else {
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = sender.send(response).await;
                    });
                }
            }
        });
        MockHandle {
            state: self.state,
            sender: Some(sender),
            task: Some(task),
        }
    }
}

/// Control over a running mock server.
pub struct MockHandle {
    pub(crate) state: Arc<MockState>,
    sender: Option<MemoryPeerSender>,
    task: Option<JoinHandle<()>>,
}

impl MockHandle {
    pub(crate) fn detached(state: Arc<MockState>) -> Self {
        Self {
            state,
            sender: None,
            task: None,
        }
    }

    /// Every frame received so far.
    #[must_use]
    pub fn received(&self) -> Vec<Message> {
        self.state.received.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Every request for `method` received so far.
    #[must_use]
    pub fn requests(&self, method: &str) -> Vec<Request> {
        self.received()
            .into_iter()
            .filter_map(|m| match m {
                Message::Request(r) if r.method == method => Some(r),
                _ => None,
            })
            .collect()
    }

    /// Every notification received so far, by method.
    #[must_use]
    pub fn notifications(&self) -> Vec<String> {
        self.received()
            .iter()
            .filter_map(Message::as_notification)
            .map(|n| n.method.to_string())
            .collect()
    }

    /// Wait until at least `count` requests for `method` arrived.
    pub async fn wait_for(&self, method: &str, count: usize) -> Vec<Request> {
        loop {
            let notified = self.state.seen.notified();
            let requests = self.requests(method);
            if requests.len() >= count {
                return requests;
            }
            notified.await;
        }
    }

    /// Replace the tool set and tell the client its list changed.
    ///
    /// Over HTTP there is no push channel, so only the tool set changes.
    pub async fn set_tools(&self, tools: Vec<MockTool>) {
        *self.state.tools.write().unwrap_or_else(|e| e.into_inner()) = tools;
        self.notify(Notification::new(NOTIFICATION_TOOLS_LIST_CHANGED))
            .await;
    }

    /// Push a notification to the client.
    pub async fn notify(&self, notification: Notification) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(notification).await;
        }
    }

    /// Push a raw frame to the client.
    pub async fn send(&self, message: impl Into<Message>) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(message).await;
        }
    }

    /// Close the channel from the server side.
    pub async fn close(&self) {
        if let Some(sender) = &self.sender {
            sender.close().await;
        }
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

pub(crate) struct MockState {
    info: ServerInfo,
    protocol_version: String,
    instructions: Option<String>,
    tools: RwLock<Vec<MockTool>>,
    resources: Vec<MockResource>,
    templates: Vec<ResourceTemplate>,
    page_size: Option<usize>,
    unsupported: HashSet<String>,
    failing: HashMap<String, JsonRpcError>,
    silent: HashSet<String>,
    received: Mutex<Vec<Message>>,
    seen: Notify,
}

impl MockState {
    pub(crate) fn record(&self, message: Message) {
        self.received
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message);
        self.seen.notify_waiters();
    }

    fn capabilities(&self) -> ServerCapabilities {
        let caps = ServerCapabilities::new().with_tools_and_changes();
        if self.resources.is_empty() && self.templates.is_empty() {
            caps
        } else {
            caps.with_resources_and_changes()
        }
    }

    pub(crate) fn handle(&self, request: Request) -> Option<(Response, Duration)> {
        let method: &str = &request.method;
        if self.silent.contains(method) {
            return None;
        }
        if self.unsupported.contains(method) {
            let error = JsonRpcError::method_not_found(method);
            return Some((Response::error(request.id, error), Duration::ZERO));
        }
        if let Some(error) = self.failing.get(method) {
            return Some((Response::error(request.id, error.clone()), Duration::ZERO));
        }

        let params = request.params.unwrap_or(Value::Null);
        let (result, delay) = match method {
            INITIALIZE => (Ok(self.initialize_result()), Duration::ZERO),
            PING => (Ok(json!({})), Duration::ZERO),
            TOOLS_LIST => {
                let tools: Vec<Tool> = self
                    .tools
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .iter()
                    .map(MockTool::to_tool)
                    .collect();
                (Ok(self.page("tools", &tools, &params)), Duration::ZERO)
            }
            TOOLS_CALL => self.call_tool(params),
            RESOURCES_LIST => {
                let resources: Vec<Resource> =
                    self.resources.iter().map(MockResource::to_resource).collect();
                (Ok(self.page("resources", &resources, &params)), Duration::ZERO)
            }
            RESOURCES_TEMPLATES_LIST => (
                Ok(self.page("resourceTemplates", &self.templates, &params)),
                Duration::ZERO,
            ),
            RESOURCES_READ => (self.read_resource(params), Duration::ZERO),
            other => (Err(JsonRpcError::method_not_found(other)), Duration::ZERO),
        };

        let response = match result {
            Ok(value) => Response::success(request.id, value),
            Err(error) => Response::error(request.id, error),
        };
        Some((response, delay))
    }

    fn initialize_result(&self) -> Value {
        let mut result = json!({
            "protocolVersion": self.protocol_version,
            "capabilities": self.capabilities(),
            "serverInfo": self.info,
        });
        if let Some(instructions) = &self.instructions {
            result["instructions"] = json!(instructions);
        }
        result
    }

    fn page<T: serde::Serialize>(&self, field: &str, items: &[T], params: &Value) -> Value {
        let offset = params
            .get("cursor")
            .and_then(Value::as_str)
            .and_then(|c| c.parse::<usize>().ok())
            .unwrap_or(0)
            .min(items.len());
        let end = self
            .page_size
            .map_or(items.len(), |size| (offset + size).min(items.len()));

        let mut page = json!({ field: &items[offset..end] });
        if end < items.len() {
            page["nextCursor"] = json!(end.to_string());
        }
        page
    }

    fn call_tool(&self, params: Value) -> (Result<Value, JsonRpcError>, Duration) {
        let call: CallToolRequest = match serde_json::from_value(params) {
            Ok(call) => call,
            Err(e) => return (Err(JsonRpcError::invalid_params(e.to_string())), Duration::ZERO),
        };
        let tool = self
            .tools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|t| t.name == call.name)
            .cloned();
        let Some(tool) = tool else {
            return (
                Err(JsonRpcError::invalid_params(format!("Unknown tool: {}", call.name))),
                Duration::ZERO,
            );
        };

        let args = call.arguments.map_or(Value::Null, Value::Object);
        let result = serde_json::to_value(tool.call(args))
            .map_err(|e| JsonRpcError::internal_error(e.to_string()));
        (result, tool.delay)
    }

    fn read_resource(&self, params: Value) -> Result<Value, JsonRpcError> {
        let request: ReadResourceRequest = serde_json::from_value(params)
            .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;
        let resource = self
            .resources
            .iter()
            .find(|r| r.uri == request.uri)
            .ok_or_else(|| {
                JsonRpcError::new(
                    codes::RESOURCE_NOT_FOUND,
                    format!("Resource not found: {}", request.uri),
                )
            })?;
        Ok(json!({ "contents": [resource.to_contents()] }))
    }
}
