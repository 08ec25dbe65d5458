//! Cached results of discovery.

use std::collections::BTreeMap;

use toolbridge_core::types::{Resource, ResourceTemplate, Tool};

/// Tools, resources and templates a server declared, keyed by name or URI.
///
/// Each category is replaced wholesale by a discovery pass; nothing edits
/// individual entries.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tools: BTreeMap<String, Tool>,
    resources: BTreeMap<String, Resource>,
    templates: BTreeMap<String, ResourceTemplate>,
}

impl Catalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every cached tool.
    pub fn replace_tools(&mut self, tools: impl IntoIterator<Item = Tool>) {
        self.tools = tools.into_iter().map(|t| (t.name.clone(), t)).collect();
    }

    /// Replace every cached resource.
    pub fn replace_resources(&mut self, resources: impl IntoIterator<Item = Resource>) {
        self.resources = resources.into_iter().map(|r| (r.uri.clone(), r)).collect();
    }

    /// Replace every cached resource template.
    pub fn replace_templates(&mut self, templates: impl IntoIterator<Item = ResourceTemplate>) {
        self.templates = templates
            .into_iter()
            .map(|t| (t.uri_template.clone(), t))
            .collect();
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.tools.clear();
        self.resources.clear();
        self.templates.clear();
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn tool(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    /// Every tool, ordered by name.
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.tools.values().cloned().collect()
    }

    /// Every resource, ordered by URI.
    #[must_use]
    pub fn resources(&self) -> Vec<Resource> {
        self.resources.values().cloned().collect()
    }

    /// Every resource template, ordered by URI template.
    #[must_use]
    pub fn templates(&self) -> Vec<ResourceTemplate> {
        self.templates.values().cloned().collect()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty() && self.resources.is_empty() && self.templates.is_empty()
    }
}
