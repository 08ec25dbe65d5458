//! Payload types for the methods the client consumes.

pub mod content;
pub mod methods;
pub mod resource;
pub mod tool;

pub use content::{BinaryContent, Content, EmbeddedResource, ResourceLink, TextContent};
pub use resource::{
    ListResourceTemplatesResult, ListResourcesResult, ReadResourceRequest, ReadResourceResult,
    Resource, ResourceContents, ResourceTemplate, ResourceUpdatedNotification,
};
pub use tool::{CallToolRequest, CallToolResult, ListToolsResult, Tool};
