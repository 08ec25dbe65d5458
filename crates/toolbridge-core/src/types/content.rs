//! Content parts carried in tool results.
//!
//! A tool result is a list of parts, each tagged by `type`. Parts are decoded
//! into plain JSON values before they reach the caller; see
//! [`Content::decode`].

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::resource::ResourceContents;

/// One part of a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// Plain text.
    Text(TextContent),
    /// Base64-encoded image.
    Image(BinaryContent),
    /// Base64-encoded audio.
    Audio(BinaryContent),
    /// An embedded resource.
    Resource(EmbeddedResource),
    /// A link to a resource the caller may read separately.
    ResourceLink(ResourceLink),
}

impl Content {
    /// Text content.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextContent {
            text: text.into(),
            annotations: None,
        })
    }

    /// Image content from base64 data.
    #[must_use]
    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image(BinaryContent {
            data: data.into(),
            mime_type: mime_type.into(),
            annotations: None,
        })
    }

    /// The text, if this is a text part.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(&t.text),
            _ => None,
        }
    }

    /// Decode this part into the value handed to callers.
    ///
    /// Text becomes a JSON string. Binary parts keep their tag, base64 data,
    /// and MIME type. Embedded resources become their contents object and
    /// links become the link object.
    #[must_use]
    pub fn decode(&self) -> Value {
        match self {
            Self::Text(t) => Value::String(t.text.clone()),
            Self::Image(b) => json!({"type": "image", "data": b.data, "mimeType": b.mime_type}),
            Self::Audio(b) => json!({"type": "audio", "data": b.data, "mimeType": b.mime_type}),
            Self::Resource(embedded) => {
                serde_json::to_value(&embedded.resource).unwrap_or(Value::Null)
            }
            Self::ResourceLink(link) => serde_json::to_value(link).unwrap_or(Value::Null),
        }
    }
}

/// Text part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    /// The text.
    pub text: String,
    /// Audience/priority hints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Value>,
}

/// Image or audio part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryContent {
    /// Base64-encoded payload.
    pub data: String,
    /// MIME type, e.g. `image/png`.
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// Audience/priority hints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Value>,
}

/// Embedded resource part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedResource {
    /// The resource contents.
    pub resource: ResourceContents,
    /// Audience/priority hints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Value>,
}

/// Resource link part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLink {
    /// Resource URI.
    pub uri: String,
    /// Resource name.
    pub name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type.
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}
