//! Enumeration of a server's tools, resources and templates.
//!
//! Discovery runs once after the handshake and again whenever the server
//! signals a list change. Each category is fault-tolerant on its own: a
//! server that rejects a listing method, or fails it, is treated as having
//! nothing of that kind. Passes never interleave; they queue on the client's
//! discovery lock.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::json;
use toolbridge_core::error::{BridgeError, BridgeResult};
use toolbridge_core::types::methods::{RESOURCES_LIST, RESOURCES_TEMPLATES_LIST, TOOLS_LIST};
use toolbridge_core::types::{
    ListResourceTemplatesResult, ListResourcesResult, ListToolsResult, Resource, Tool,
};
use toolbridge_transport::Transport;
use tracing::{Instrument, debug, warn};

use crate::client::ClientInner;
use crate::event::ClientEvent;
use crate::state::ClientState;

/// Upper bound on pages followed for one listing.
pub const MAX_PAGES: usize = 64;

/// What a list-change notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Category {
    Tools,
    Resources,
}

impl<T: Transport + 'static> ClientInner<T> {
    /// The pass run while connecting.
    pub(crate) async fn discover_all(&self) {
        let _pass = self.discovery_lock.lock().await;
        self.discover_tools().await;
        self.discover_resources().await;
    }

    pub(crate) async fn refresh_tools(&self) -> Vec<Tool> {
        let _pass = self.discovery_lock.lock().await;
        self.discover_tools().await
    }

    pub(crate) async fn refresh_resources(&self) -> Vec<Resource> {
        let _pass = self.discovery_lock.lock().await;
        self.discover_resources().await
    }

    /// Re-run discovery for `category` on a background task.
    pub(crate) fn spawn_refresh(self: &Arc<Self>, category: Category) {
        if !matches!(self.state(), ClientState::Handshaking | ClientState::Ready) {
            debug!(?category, state = %self.state(), "Ignoring list change outside a connection");
            return;
        }
        let inner = Arc::clone(self);
        tokio::spawn(
            async move {
                let _pass = inner.discovery_lock.lock().await;
                if !inner.state().is_live() {
                    return;
                }
                debug!(?category, "Server reported a list change, refreshing");
                match category {
                    Category::Tools => {
                        inner.discover_tools().await;
                    }
                    Category::Resources => {
                        inner.discover_resources().await;
                    }
                }
            }
            .in_current_span(),
        );
    }

    async fn discover_tools(&self) -> Vec<Tool> {
        let tools = self
            .list_all(TOOLS_LIST, |page: ListToolsResult| (page.tools, page.next_cursor))
            .await
            .unwrap_or_else(|e| self.degrade(TOOLS_LIST, &e));

        // A teardown during the pass already cleared the cache.
        if !self.state().is_live() {
            return tools;
        }
        let snapshot = {
            let mut catalog = self.catalog_mut();
            catalog.replace_tools(tools);
            catalog.tools()
        };
        debug!(count = snapshot.len(), "Tool cache replaced");
        self.emit(ClientEvent::ToolsChanged(snapshot.clone()));
        snapshot
    }

    async fn discover_resources(&self) -> Vec<Resource> {
        let resources = self
            .list_all(RESOURCES_LIST, |page: ListResourcesResult| {
                (page.resources, page.next_cursor)
            })
            .await
            .unwrap_or_else(|e| self.degrade(RESOURCES_LIST, &e));

        let templates_advertised = self
            .with_session(|s| s.capabilities.has_resource_templates())
            .unwrap_or(false);
        let templates = if templates_advertised {
            self.list_all(
                RESOURCES_TEMPLATES_LIST,
                |page: ListResourceTemplatesResult| (page.resource_templates, page.next_cursor),
            )
            .await
            .unwrap_or_else(|e| self.degrade(RESOURCES_TEMPLATES_LIST, &e))
        } else {
            Vec::new()
        };

        if !self.state().is_live() {
            return resources;
        }
        let (resources, templates) = {
            let mut catalog = self.catalog_mut();
            catalog.replace_resources(resources);
            catalog.replace_templates(templates);
            (catalog.resources(), catalog.templates())
        };
        debug!(
            resources = resources.len(),
            templates = templates.len(),
            "Resource cache replaced"
        );
        self.emit(ClientEvent::ResourcesChanged {
            resources: resources.clone(),
            templates,
        });
        resources
    }

    fn degrade<I>(&self, method: &str, error: &BridgeError) -> Vec<I> {
        if error.is_unsupported() {
            debug!(method, "Server does not implement listing, treating as empty");
        } else {
            warn!(method, error = %error, "Listing failed, treating as empty");
        }
        Vec::new()
    }

    /// Follow `nextCursor` until the listing is exhausted.
    async fn list_all<P, I>(
        &self,
        method: &'static str,
        split: impl Fn(P) -> (Vec<I>, Option<String>),
    ) -> BridgeResult<Vec<I>>
    where
        P: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let params = cursor.take().map(|c| json!({ "cursor": c }));
            let page: P = self.request_as(method, params).await?;
            let (batch, next) = split(page);
            items.extend(batch);
            match next {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(items),
            }
        }
        warn!(method, pages = MAX_PAGES, "Stopped following pagination cursor");
        Ok(items)
    }
}
