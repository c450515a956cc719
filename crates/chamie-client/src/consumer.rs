//! Incremental SSE decoder.
//!
//! Turns raw response-body bytes into [`StreamEvent`]s. Chunk boundaries
//! carry no meaning: a frame split across any number of reads decodes
//! identically to one delivered whole. A malformed `data:` payload is
//! logged and skipped; it never aborts the stream.

use chamie_protocol::StreamEvent;
use tracing::warn;

/// Buffering decoder from raw bytes to stream events.
///
/// SSE frames are blocks separated by a blank line; only `data:` fields are
/// meaningful on this wire. Other fields (`id:`, `retry:`, comments) are
/// ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of response bytes, returning every event completed by
    /// it, in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        while let Some(boundary) = self.buffer.find("\n\n") {
            let block = self.buffer[..boundary].to_string();
            self.buffer.drain(..boundary + 2);

            for line in block.lines() {
                let line = line.strip_suffix('\r').unwrap_or(line);
                let Some(payload) = line.strip_prefix("data:") else {
                    continue;
                };
                match StreamEvent::parse_data(payload.trim_start_matches(' ')) {
                    Ok(event) => events.push(event),
                    Err(err) => {
                        warn!(payload = %payload, error = %err, "skipping malformed stream frame");
                    }
                }
            }
        }
        events
    }

    /// Flush any trailing partial frame at end of input.
    ///
    /// A well-formed stream ends on a frame boundary, but a connection cut
    /// mid-frame can leave a complete `data:` line without its trailing
    /// blank line in the buffer.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let rest = std::mem::take(&mut self.buffer);
        let mut events = Vec::new();
        for line in rest.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            let Some(payload) = line.strip_prefix("data:") else {
                continue;
            };
            match StreamEvent::parse_data(payload.trim_start_matches(' ')) {
                Ok(event) => events.push(event),
                Err(err) => {
                    warn!(payload = %payload, error = %err, "skipping malformed trailing frame");
                }
            }
        }
        events
    }
}
