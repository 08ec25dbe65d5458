//! Server-Sent Events (SSE) parsing.

use toolbridge_core::protocol::{Message, decode_messages};

use crate::error::TransportError;

/// Incremental SSE parser.
///
/// Feed it raw body chunks as they arrive; it returns the frames carried by
/// every event completed so far and keeps the remainder buffered. Chunk
/// boundaries may fall anywhere, including inside a UTF-8 sequence.
#[derive(Debug)]
pub struct SseParser {
    buffer: Vec<u8>,
    last_event_id: Option<String>,
    max_message_size: usize,
}

impl SseParser {
    /// Create a parser that rejects events larger than `max_message_size`.
    #[must_use]
    pub const fn new(max_message_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            last_event_id: None,
            max_message_size,
        }
    }

    /// Id of the last event that carried one, for stream resumption.
    #[must_use]
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Consume a chunk and return the frames of every completed event.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Message>, TransportError> {
        self.buffer
            .extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut messages = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let event: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let event = std::str::from_utf8(&event[..end])
                .map_err(|e| TransportError::invalid_message(format!("invalid UTF-8 in event: {e}")))?;
            self.parse_event(event, &mut messages)?;
        }

        if self.buffer.len() > self.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: self.buffer.len(),
                max: self.max_message_size,
            });
        }
        Ok(messages)
    }

    /// Flush the event left in the buffer when the body ends without a
    /// trailing blank line.
    pub fn finish(&mut self) -> Result<Vec<Message>, TransportError> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = std::str::from_utf8(&rest)
            .map_err(|e| TransportError::invalid_message(format!("invalid UTF-8 in event: {e}")))?;

        let mut messages = Vec::new();
        if !rest.trim().is_empty() {
            self.parse_event(rest, &mut messages)?;
        }
        Ok(messages)
    }

    fn parse_event(&mut self, event: &str, out: &mut Vec<Message>) -> Result<(), TransportError> {
        let mut data_lines = Vec::new();
        for line in event.lines() {
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "data" => data_lines.push(value),
                "id" => self.last_event_id = Some(value.to_string()),
                // event:, retry: and unknown fields carry nothing we use.
                _ => {}
            }
        }

        if data_lines.is_empty() {
            return Ok(());
        }
        let data = data_lines.join("\n");
        if data.trim().is_empty() {
            return Ok(());
        }
        if data.len() > self.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: data.len(),
                max: self.max_message_size,
            });
        }

        match decode_messages(&data) {
            Ok(messages) => out.extend(messages),
            Err(e) => tracing::warn!(error = %e, "Failed to parse SSE data as JSON-RPC"),
        }
        Ok(())
    }
}
