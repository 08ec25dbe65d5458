//! Pre-built tools, resources and templates for common test scenarios.

use serde_json::{Value, json};
use toolbridge_core::types::{CallToolResult, ResourceTemplate};

use crate::mock::{MockResource, MockTool};

fn number(args: &Value, key: &str) -> f64 {
    args.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

/// Create a set of sample tools for testing.
///
/// Returns tools:
/// - `echo`: Echoes back the input
/// - `add`: Adds two numbers
/// - `multiply`: Multiplies two numbers
/// - `fail`: Always returns an error
/// - `inspect`: Returns its arguments as structured content. Its `filter`
///   property is declared as an object, which exercises argument coercion.
#[must_use]
pub fn sample_tools() -> Vec<MockTool> {
    let pair = json!({
        "type": "object",
        "properties": {
            "a": { "type": "number" },
            "b": { "type": "number" }
        },
        "required": ["a", "b"]
    });
    vec![
        MockTool::new("echo")
            .description("Echo back the input")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "message": { "type": "string" }
                },
                "required": ["message"]
            }))
            .handler(|args| {
                let message = args
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("(no message)");
                CallToolResult::text(message)
            }),
        MockTool::new("add")
            .description("Add two numbers")
            .input_schema(pair.clone())
            .handler(|args| CallToolResult::text(format!("{}", number(&args, "a") + number(&args, "b")))),
        MockTool::new("multiply")
            .description("Multiply two numbers")
            .input_schema(pair)
            .handler(|args| CallToolResult::text(format!("{}", number(&args, "a") * number(&args, "b")))),
        MockTool::new("fail")
            .description("Always fails")
            .returns_error("This tool always fails"),
        MockTool::new("inspect")
            .description("Return the arguments as received")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "filter": {
                        "type": "object",
                        "properties": { "tags": { "type": "array", "items": { "type": "string" } } }
                    },
                    "label": { "type": "string" }
                }
            }))
            .handler(|args| CallToolResult {
                structured_content: Some(args),
                ..CallToolResult::default()
            }),
    ]
}

/// Create a set of sample resources for testing.
#[must_use]
pub fn sample_resources() -> Vec<MockResource> {
    vec![
        MockResource::new("file:///readme.md", "readme")
            .mime_type("text/markdown")
            .content("# Test Project\n\nThis is a test."),
        MockResource::new("file:///config.json", "config")
            .mime_type("application/json")
            .content(r#"{"debug": true, "port": 8080}"#),
        MockResource::new("file:///data.csv", "data")
            .mime_type("text/csv")
            .content("id,name,value\n1,foo,100\n2,bar,200"),
    ]
}

/// Create a set of sample resource templates for testing.
#[must_use]
pub fn sample_templates() -> Vec<ResourceTemplate> {
    vec![
        ResourceTemplate::new("file:///logs/{date}.log", "daily-log"),
        ResourceTemplate::new("db://tables/{table}", "table"),
    ]
}
