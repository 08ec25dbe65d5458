//! HTTP transport client implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_lock::Mutex as AsyncMutex;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use toolbridge_core::protocol::{Message, decode_messages};

use crate::error::TransportError;
use crate::traits::{
    EVENT_CHANNEL_CAPACITY, EventReceiver, EventSender, Transport, TransportEvent,
    TransportMetadata,
};

use super::config::{
    HttpTransportConfig, LAST_EVENT_ID_HEADER, MCP_PROTOCOL_VERSION_HEADER, MCP_SESSION_ID_HEADER,
};
use super::sse::SseParser;

const POST_ACCEPT: &str = "application/json, text/event-stream";
const STREAM_ACCEPT: &str = "text/event-stream";

/// Streamable HTTP transport.
///
/// Sends each frame with a POST and feeds whatever the server answers into
/// the event channel returned by [`Transport::connect`].
pub struct HttpTransport {
    shared: Arc<Shared>,
}

struct Shared {
    config: HttpTransportConfig,
    client: Client,
    state: AsyncMutex<HttpState>,
    connected: AtomicBool,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
}

#[derive(Default)]
struct HttpState {
    session_id: Option<String>,
    last_event_id: Option<String>,
    events: Option<EventSender>,
    push_stream: Option<JoinHandle<()>>,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given configuration.
    ///
    /// Nothing is sent until the transport is connected.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        config.validate()?;
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| TransportError::connection(format!("Failed to create HTTP client: {e}")))?;

        let state = HttpState {
            session_id: config.session_id.clone(),
            ..HttpState::default()
        };
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                client,
                state: AsyncMutex::new(state),
                connected: AtomicBool::new(false),
                messages_sent: AtomicU64::new(0),
                messages_received: AtomicU64::new(0),
            }),
        })
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &HttpTransportConfig {
        &self.shared.config
    }

    /// Get the current session ID, if any.
    pub async fn session_id(&self) -> Option<String> {
        self.shared.state.lock().await.session_id.clone()
    }

    /// Get the last event ID seen on any event stream.
    pub async fn last_event_id(&self) -> Option<String> {
        self.shared.state.lock().await.last_event_id.clone()
    }

    /// Whether the server push stream is open.
    pub async fn has_push_stream(&self) -> bool {
        self.shared
            .state
            .lock()
            .await
            .push_stream
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Get the number of messages sent.
    #[must_use]
    pub fn messages_sent(&self) -> u64 {
        self.shared.messages_sent.load(Ordering::Relaxed)
    }

    /// Get the number of messages received.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.shared.messages_received.load(Ordering::Relaxed)
    }
}

impl Shared {
    fn build_headers(
        &self,
        session_id: Option<&str>,
        accept: &'static str,
    ) -> Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::new();

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        headers.insert(
            MCP_PROTOCOL_VERSION_HEADER,
            HeaderValue::from_str(&self.config.protocol_version).map_err(|e| {
                TransportError::connection(format!("Invalid protocol version header: {e}"))
            })?,
        );

        if let Some(sid) = session_id {
            headers.insert(
                MCP_SESSION_ID_HEADER,
                HeaderValue::from_str(sid).map_err(|e| {
                    TransportError::connection(format!("Invalid session ID header: {e}"))
                })?,
            );
        }

        for (name, value) in &self.config.headers {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                    TransportError::connection(format!("Invalid header name '{name}': {e}"))
                })?,
                HeaderValue::from_str(value).map_err(|e| {
                    TransportError::connection(format!("Invalid header value for '{name}': {e}"))
                })?,
            );
        }

        Ok(headers)
    }

    async fn event_sender(&self) -> Result<EventSender, TransportError> {
        self.state
            .lock()
            .await
            .events
            .clone()
            .ok_or(TransportError::NotConnected)
    }

    async fn deliver(&self, tx: &EventSender, msg: Message) -> Result<(), TransportError> {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        tx.send(TransportEvent::Message(msg))
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn remember_event_id(&self, parser: &SseParser) {
        if let Some(id) = parser.last_event_id() {
            self.state.lock().await.last_event_id = Some(id.to_string());
        }
    }

    /// Open the server push stream unless one is already running.
    async fn try_open_push_stream(self: &Arc<Self>) {
        let (session_id, last_event_id, tx) = {
            let state = self.state.lock().await;
            if state.push_stream.as_ref().is_some_and(|h| !h.is_finished()) {
                return;
            }
            match state.events.clone() {
                Some(tx) => (state.session_id.clone(), state.last_event_id.clone(), tx),
                None => return,
            }
        };

        match self
            .open_push_stream(session_id.as_deref(), last_event_id.as_deref())
            .await
        {
            Ok(response) => {
                let mut state = self.state.lock().await;
                // close() may have run while the GET was in flight.
                if state.events.as_ref().is_none_or(|current| !current.same_channel(&tx)) {
                    tracing::debug!("Transport closed before the push stream opened");
                    return;
                }
                let handle = tokio::spawn(Arc::clone(self).read_push_stream(response, tx));
                if let Some(stale) = state.push_stream.replace(handle) {
                    stale.abort();
                }
                drop(state);
                tracing::debug!(url = %self.config.base_url, "Push stream opened");
            }
            Err(e) => {
                tracing::debug!(error = %e, "Push stream unavailable; using request/response mode");
            }
        }
    }

    async fn open_push_stream(
        &self,
        session_id: Option<&str>,
        last_event_id: Option<&str>,
    ) -> Result<Response, TransportError> {
        let mut headers = self.build_headers(session_id, STREAM_ACCEPT)?;
        if let Some(id) = last_event_id.and_then(|id| HeaderValue::from_str(id).ok()) {
            headers.insert(LAST_EVENT_ID_HEADER, id);
        }

        let response = self
            .client
            .get(&self.config.base_url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| TransportError::connection(format!("HTTP GET failed: {e}")))?;

        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        if response.status() == StatusCode::OK && is_stream {
            Ok(response)
        } else {
            Err(TransportError::Http {
                status: response.status().as_u16(),
                body: String::new(),
            })
        }
    }

    async fn read_push_stream(self: Arc<Self>, response: Response, tx: EventSender) {
        let mut parser = SseParser::new(self.config.max_message_size);
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            let chunk: Bytes = match chunk_result {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::debug!(error = %e, "Push stream failed");
                    break;
                }
            };
            match parser.feed(&chunk) {
                Ok(messages) => {
                    for msg in messages {
                        if self.deliver(&tx, msg).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(TransportEvent::Error(e)).await;
                    break;
                }
            }
            self.remember_event_id(&parser).await;
        }

        match parser.finish() {
            Ok(messages) => {
                for msg in messages {
                    if self.deliver(&tx, msg).await.is_err() {
                        return;
                    }
                }
                self.remember_event_id(&parser).await;
            }
            Err(e) => {
                let _ = tx.send(TransportEvent::Error(e)).await;
            }
        }

        tracing::debug!("Push stream ended");
    }
}

impl HttpTransport {
    /// Handle the HTTP response, which may be JSON or SSE.
    async fn handle_response(
        &self,
        response: Response,
        sent_session: Option<String>,
    ) -> Result<(), TransportError> {
        let shared = &self.shared;
        let status = response.status();

        let issued = response
            .headers()
            .get(MCP_SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(sid) = issued {
            let is_new = {
                let mut state = shared.state.lock().await;
                let is_new = state.session_id.as_deref() != Some(sid.as_str());
                state.session_id = Some(sid.clone());
                is_new
            };
            if is_new {
                tracing::debug!(session_id = %sid, "Session issued");
                if shared.config.push_stream {
                    let shared = Arc::clone(shared);
                    tokio::spawn(async move { shared.try_open_push_stream().await });
                }
            }
        }

        match status {
            StatusCode::ACCEPTED | StatusCode::NO_CONTENT => Ok(()),
            s if s.is_success() => {
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("application/json");

                if content_type.starts_with("text/event-stream") {
                    self.process_sse_stream(response).await
                } else {
                    self.process_json_response(response).await
                }
            }
            StatusCode::NOT_FOUND if sent_session.is_some() => {
                let session_id = sent_session.unwrap_or_default();
                {
                    let mut state = shared.state.lock().await;
                    if state.session_id.as_deref() == Some(session_id.as_str()) {
                        state.session_id = None;
                    }
                }
                tracing::warn!(session_id = %session_id, "Server dropped the session");
                Err(TransportError::SessionExpired { session_id })
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(TransportError::Http {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    /// Process a direct JSON response.
    async fn process_json_response(&self, response: Response) -> Result<(), TransportError> {
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::connection(format!("Failed to read response body: {e}")))?;

        if body.trim().is_empty() {
            return Ok(());
        }

        if body.len() > self.shared.config.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: body.len(),
                max: self.shared.config.max_message_size,
            });
        }

        let messages = decode_messages(&body)?;
        let tx = self.shared.event_sender().await?;
        for msg in messages {
            self.shared.deliver(&tx, msg).await?;
        }
        Ok(())
    }

    /// Process an SSE stream answering a POST.
    async fn process_sse_stream(&self, response: Response) -> Result<(), TransportError> {
        let tx = self.shared.event_sender().await?;
        let mut parser = SseParser::new(self.shared.config.max_message_size);
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            let chunk: Bytes = chunk_result
                .map_err(|e| TransportError::connection(format!("SSE stream error: {e}")))?;
            for msg in parser.feed(&chunk)? {
                self.shared.deliver(&tx, msg).await?;
            }
        }
        for msg in parser.finish()? {
            self.shared.deliver(&tx, msg).await?;
        }

        self.shared.remember_event_id(&parser).await;
        Ok(())
    }
}

impl Transport for HttpTransport {
    async fn connect(&self) -> Result<EventReceiver, TransportError> {
        let shared = &self.shared;
        if shared.connected.swap(true, Ordering::AcqRel) {
            return Err(TransportError::AlreadyConnected);
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        shared.state.lock().await.events = Some(tx);

        if shared.config.push_stream {
            shared.try_open_push_stream().await;
        }
        Ok(rx)
    }

    async fn send(&self, msg: Message) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let shared = &self.shared;

        let body = serde_json::to_string(&msg)?;
        if body.len() > shared.config.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: body.len(),
                max: shared.config.max_message_size,
            });
        }

        let session_id = shared.state.lock().await.session_id.clone();
        let headers = shared.build_headers(session_id.as_deref(), POST_ACCEPT)?;

        let response = shared
            .client
            .post(&shared.config.base_url)
            .headers(headers)
            .timeout(shared.config.request_timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::connection(format!("HTTP POST failed: {e}")))?;
        shared.messages_sent.fetch_add(1, Ordering::Relaxed);

        self.handle_response(response, session_id).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        let shared = &self.shared;
        if !shared.connected.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let (session_id, push_stream) = {
            let mut state = shared.state.lock().await;
            state.events = None;
            (state.session_id.take(), state.push_stream.take())
        };
        if let Some(handle) = push_stream {
            handle.abort();
        }

        // Terminating the session is best effort.
        if let Some(sid) = session_id {
            let request = shared
                .build_headers(Some(&sid), POST_ACCEPT)
                .map(|headers| {
                    shared
                        .client
                        .delete(&shared.config.base_url)
                        .headers(headers)
                        .timeout(shared.config.request_timeout)
                });
            match request {
                Ok(request) => match request.send().await {
                    Ok(response) => {
                        tracing::debug!(session_id = %sid, status = %response.status(), "Session terminated");
                    }
                    Err(e) => {
                        tracing::debug!(session_id = %sid, error = %e, "Session termination failed");
                    }
                },
                Err(e) => tracing::debug!(error = %e, "Could not build session termination request"),
            }
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    fn metadata(&self) -> TransportMetadata {
        TransportMetadata::new("http")
            .remote_addr(&self.shared.config.base_url)
            .bidirectional(self.shared.config.push_stream)
    }
}
