//! Incremental server-sent-events decoder.
//!
//! Network chunks split events at arbitrary byte offsets; the decoder keeps
//! the tail in a `BytesMut` and emits only complete events.

use bytes::BytesMut;

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// `event:` field, when the provider names its events
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

/// Parse a single SSE line into (key, value) pair.
///
/// SSE format: `key: value\n`
pub fn parse_sse_line(line: &str) -> Option<(String, String)> {
    let colon_pos = line.find(':')?;
    let key = &line[..colon_pos];
    let value = line[colon_pos + 1..].trim_start();
    Some((key.to_string(), value.to_string()))
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes; returns every event completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_raw = self.buffer.split_to(pos + 1);
            let line = String::from_utf8_lossy(&line_raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.consume_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing event the upstream did not terminate with a blank line.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = self.buffer.split();
            let line = String::from_utf8_lossy(&rest);
            if let Some(event) = self.consume_line(line.trim_end_matches(['\n', '\r'])) {
                events.push(event);
            }
        }
        if let Some(event) = self.dispatch() {
            events.push(event);
        }
        events
    }

    fn consume_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        match parse_sse_line(line) {
            Some((key, value)) => match key.as_str() {
                "data" => self.data.push(value),
                "event" => self.event = Some(value),
                _ => {},
            },
            None => {
                tracing::debug!("Ignoring malformed SSE line: {}", line);
            },
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        let data = self.data.join("\n");
        self.data.clear();
        Some(SseEvent { event: self.event.take(), data })
    }
}
