//! Incremental decoding of `text/event-stream` bodies.
//!
//! Every backend we talk to (chat completions, the UMS agent) streams
//! OpenAI-style `data: {...}` lines terminated by `data: [DONE]`. Network
//! chunks do not respect line boundaries, so bytes are buffered until a full
//! line is available. Buffering raw bytes also keeps multi-byte UTF-8
//! characters intact when they straddle two chunks.

/// Terminal payload of an OpenAI-style stream.
pub const DONE_MARKER: &str = "[DONE]";

/// Splits a byte stream into complete SSE `data:` payloads.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the `data:` payloads of every completed line.
    ///
    /// Comment lines (`:`), other SSE fields and blank separators are dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(payload) = parse_line(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a trailing line that arrived without a final newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }
}

fn parse_line(raw: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches(['\r', '\n']);
    let data = line.strip_prefix("data:")?;
    Some(data.strip_prefix(' ').unwrap_or(data).to_string())
}

/// True for the `[DONE]` end-of-stream payload.
pub fn is_done(payload: &str) -> bool {
    payload.trim() == DONE_MARKER
}
