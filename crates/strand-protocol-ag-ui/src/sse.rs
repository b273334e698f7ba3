//! Incremental SSE record decoding.
//!
//! Inverts the server-side `data: <json>\n\n` framing: raw byte chunks go
//! in, decoded events come out. Chunk boundaries are arbitrary — a record
//! (or a multi-byte UTF-8 sequence) may be split across chunks, so bytes
//! are buffered until a blank-line delimiter completes a record.

use crate::Event;
use tracing::warn;

/// Streaming decoder from SSE bytes to AG-UI events.
///
/// # Examples
///
/// ```
/// use strand_protocol_ag_ui::SseDecoder;
///
/// let mut decoder = SseDecoder::new();
/// let events = decoder.push(b"data: {\"type\":\"RUN_STARTED\",\"thread_id\":\"t\",\"run_id\":\"r\"}\n\n");
/// assert_eq!(events.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Event> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some((record_end, delim_len)) = find_record_end(&self.buf) {
            let record: Vec<u8> = self.buf.drain(..record_end + delim_len).collect();
            if let Some(event) = decode_record(&record[..record_end]) {
                events.push(event);
            }
        }
        events
    }

    /// Drain a final unterminated record after the stream closes.
    pub fn finish(&mut self) -> Vec<Event> {
        let rest = std::mem::take(&mut self.buf);
        decode_record(&rest).into_iter().collect()
    }
}

/// Find the earliest blank-line delimiter (`\n\n` or `\r\n\r\n`).
fn find_record_end(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buf
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Decode one record's bytes into an event, if it carries one.
///
/// `[DONE]` and empty payloads are stream punctuation; malformed JSON is
/// dropped so a single corrupt record cannot abort a healthy run.
fn decode_record(record: &[u8]) -> Option<Event> {
    let text = String::from_utf8_lossy(record);
    let payload = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");

    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    match serde_json::from_str(&payload) {
        Ok(value) => Some(Event::decode(&value)),
        Err(error) => {
            warn!(%error, "dropping malformed SSE record");
            None
        }
    }
}
