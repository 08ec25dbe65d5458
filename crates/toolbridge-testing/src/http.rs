//! Serving a [`MockServer`] over streamable HTTP.
//!
//! The endpoint lives at `/mcp`. `initialize` issues a session id, and
//! every later POST must carry it or gets a 404. Notifications are answered
//! with 202, GET with 405 (there is no push stream).

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::CONTENT_TYPE};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::post;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use toolbridge_core::protocol::Message;
use toolbridge_core::types::methods::INITIALIZE;
use toolbridge_transport::http::MCP_SESSION_ID_HEADER;

use crate::mock::{MockHandle, MockServer, MockState};

struct HttpState {
    mock: Arc<MockState>,
    session: Mutex<Option<String>>,
    deletes: Mutex<Vec<Option<String>>>,
}

impl HttpState {
    fn session(&self) -> Option<String> {
        self.session.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// A mock server listening on a local port.
pub struct MockHttpServer {
    addr: SocketAddr,
    handle: MockHandle,
    state: Arc<HttpState>,
    task: JoinHandle<()>,
}

impl MockHttpServer {
    /// Endpoint URL to hand to the HTTP transport.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}/mcp", self.addr)
    }

    /// Recorded traffic and tool control.
    #[must_use]
    pub fn handle(&self) -> &MockHandle {
        &self.handle
    }

    /// The session id currently accepted, if one was issued.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.state.session()
    }

    /// Forget the session, so the next POST carrying it gets a 404.
    pub fn expire_session(&self) {
        *self.state.session.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Session header of every DELETE received.
    #[must_use]
    pub fn deletes(&self) -> Vec<Option<String>> {
        self.state
            .deletes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Drop for MockHttpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl MockServer {
    /// Serve over HTTP on an ephemeral local port.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn serve_http(self) -> std::io::Result<MockHttpServer> {
        let mock = self.shared_state();
        let state = Arc::new(HttpState {
            mock: Arc::clone(&mock),
            session: Mutex::new(None),
            deletes: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/mcp", post(handle_post).get(handle_get).delete(handle_delete))
            .with_state(Arc::clone(&state));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::warn!(error = %e, "Mock HTTP server stopped");
            }
        });

        Ok(MockHttpServer {
            addr,
            handle: MockHandle::detached(mock),
            state,
            task,
        })
    }
}

fn session_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(MCP_SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn handle_post(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: String,
) -> HttpResponse {
    let Ok(msg) = serde_json::from_str::<Message>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    state.mock.record(msg.clone());

    let is_initialize = msg.method() == Some(INITIALIZE);
    if !is_initialize && session_of(&headers) != state.session() {
        return StatusCode::NOT_FOUND.into_response();
    }

    let Message::Request(request) = msg else {
        return StatusCode::ACCEPTED.into_response();
    };
    let Some((response, delay)) = state.mock.handle(request) else {
        // Hold the POST open until the client gives up.
        std::future::pending::<()>().await;
        return StatusCode::GATEWAY_TIMEOUT.into_response();
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let Ok(body) = serde_json::to_string(&response) else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    if is_initialize {
        let session = uuid::Uuid::new_v4().to_string();
        *state.session.lock().unwrap_or_else(|e| e.into_inner()) = Some(session.clone());
        return (
            StatusCode::OK,
            [
                (CONTENT_TYPE.as_str(), "application/json".to_string()),
                (MCP_SESSION_ID_HEADER, session),
            ],
            body,
        )
            .into_response();
    }
    (StatusCode::OK, [(CONTENT_TYPE, "application/json")], body).into_response()
}

async fn handle_get() -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}

async fn handle_delete(State(state): State<Arc<HttpState>>, headers: HeaderMap) -> StatusCode {
    state
        .deletes
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(session_of(&headers));
    StatusCode::OK
}
