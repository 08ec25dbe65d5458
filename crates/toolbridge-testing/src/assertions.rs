//! Assertion helpers for tool results.

use toolbridge_core::types::{CallToolResult, Content};

fn joined_text(result: &CallToolResult) -> String {
    result
        .content
        .iter()
        .filter_map(Content::as_text)
        .collect::<Vec<_>>()
        .join("")
}

/// Assert that a tool result is successful and contains expected text.
///
/// # Panics
///
/// Panics if the result is an error or doesn't contain the expected text.
pub fn assert_tool_success(result: &CallToolResult, expected_text: &str) {
    assert!(
        !result.is_error(),
        "Expected successful tool result, but got error"
    );
    let text = joined_text(result);
    assert!(
        text.contains(expected_text),
        "Expected tool result to contain '{expected_text}', but got '{text}'"
    );
}

/// Assert that a tool result is an error with expected message.
///
/// # Panics
///
/// Panics if the result is successful or doesn't contain the expected message.
pub fn assert_tool_error(result: &CallToolResult, expected_message: &str) {
    assert!(result.is_error(), "Expected error tool result, but got success");
    let text = joined_text(result);
    assert!(
        text.contains(expected_message),
        "Expected error message to contain '{expected_message}', but got '{text}'"
    );
}
