// ABOUTME: Line-buffering SSE parser for streamed chat completions
// ABOUTME: Handles partial lines across TCP boundaries and multiple events per chunk
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # SSE Stream Parser
//!
//! Server-Sent Events framing for the streaming completion path. Two
//! correctness issues are handled here so the provider code stays simple:
//!
//! 1. **Multiple events per TCP chunk**: when network buffers batch several
//!    SSE events into one `bytes_stream()` chunk, every event is emitted.
//! 2. **Partial lines across TCP boundaries**: incomplete lines accumulate
//!    in the buffer until the terminating newline arrives.

/// A parsed SSE event from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A `data:` payload with the JSON string (prefix stripped)
    Data(String),
    /// The `[DONE]` termination signal (OpenAI convention)
    Done,
}

/// Line-buffering SSE parser
///
/// SSE streams are newline-delimited, but TCP does not align network chunks
/// with event boundaries. Complete lines are parsed as they arrive; any
/// trailing partial line waits for the next `feed()`.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: String,
}

impl SseLineBuffer {
    /// Create a new empty line buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from a TCP chunk, returning any complete SSE events
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line = self.buffer[..newline_pos].trim_end_matches('\r').to_owned();
            self.buffer.drain(..=newline_pos);

            if let Some(event) = Self::parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing unterminated line as a final event, if it parses
    ///
    /// Called once the transport reports end-of-stream; some servers omit the
    /// final newline.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let line = std::mem::take(&mut self.buffer);
        Self::parse_line(&line)
    }

    fn parse_line(line: &str) -> Option<SseEvent> {
        let trimmed = line.trim();
        // Empty lines are event separators; event:/id:/retry:/comments are ignored
        if trimmed.is_empty() {
            return None;
        }
        if trimmed == "data: [DONE]" {
            return Some(SseEvent::Done);
        }
        let data = trimmed.strip_prefix("data: ")?;
        (!data.trim().is_empty()).then(|| SseEvent::Data(data.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_event() {
        let mut buffer = SseLineBuffer::new();
        let events = buffer.feed(b"data: {\"x\":1}\n\n");
        assert_eq!(events, vec![SseEvent::Data("{\"x\":1}".to_owned())]);
    }

    #[test]
    fn test_partial_line_across_chunks() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.feed(b"data: {\"del").is_empty());
        let events = buffer.feed(b"ta\":\"hi\"}\n");
        assert_eq!(events, vec![SseEvent::Data("{\"delta\":\"hi\"}".to_owned())]);
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut buffer = SseLineBuffer::new();
        let events = buffer.feed(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\ndata: [DONE]\n");
        assert_eq!(
            events,
            vec![
                SseEvent::Data("{\"a\":1}".to_owned()),
                SseEvent::Data("{\"b\":2}".to_owned()),
                SseEvent::Done,
            ]
        );
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut buffer = SseLineBuffer::new();
        let events = buffer.feed(b"data: {\"a\":1}\r\n");
        assert_eq!(events, vec![SseEvent::Data("{\"a\":1}".to_owned())]);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.feed(b"data: [DONE]").is_empty());
        assert_eq!(buffer.finish(), Some(SseEvent::Done));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_non_data_fields_ignored() {
        let mut buffer = SseLineBuffer::new();
        let events = buffer.feed(b"event: ping\nid: 7\n: comment\ndata: {\"a\":1}\n");
        assert_eq!(events, vec![SseEvent::Data("{\"a\":1}".to_owned())]);
    }
}
