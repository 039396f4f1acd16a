use crate::logging::emit_sse_parse_error;
use crate::types::{SsePayload, DONE_SENTINEL};

/// Splits an SSE byte stream into `data:` payloads.
///
/// Chunk boundaries may fall anywhere, including inside a multi-byte UTF-8
/// sequence or in the middle of a line; both are carried over to the next call.
#[derive(Default)]
pub struct StreamParser {
    pending_bytes: Vec<u8>,
    buffer: String,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the payload of every `data:` line completed by `chunk`.
    pub fn process(&mut self, chunk: &[u8]) -> Vec<String> {
        self.decode(chunk);

        let mut records = Vec::new();
        let mut start = 0;
        while let Some(end) = self.buffer[start..].find('\n') {
            let line_end = start + end;
            if let Some(data) = data_payload(&self.buffer[start..line_end]) {
                records.push(data.to_string());
            }
            start = line_end + 1;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        records
    }

    /// Drains whatever is left once the byte stream ends. A truncated UTF-8
    /// tail is replaced rather than dropped.
    pub fn flush(&mut self) -> Vec<String> {
        if !self.pending_bytes.is_empty() {
            let tail = std::mem::take(&mut self.pending_bytes);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
        }
        let rest = std::mem::take(&mut self.buffer);
        rest.lines()
            .filter_map(data_payload)
            .map(str::to_string)
            .collect()
    }

    fn decode(&mut self, chunk: &[u8]) {
        self.pending_bytes.extend_from_slice(chunk);

        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending_bytes[consumed..]) {
                Ok(valid) => {
                    self.buffer.push_str(valid);
                    consumed = self.pending_bytes.len();
                    break;
                }
                Err(error) => {
                    let valid_end = consumed + error.valid_up_to();
                    if let Ok(valid) = std::str::from_utf8(&self.pending_bytes[consumed..valid_end])
                    {
                        self.buffer.push_str(valid);
                    }
                    match error.error_len() {
                        Some(invalid_len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_end + invalid_len;
                        }
                        // Incomplete sequence at the end; wait for more bytes.
                        None => {
                            consumed = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.pending_bytes.drain(..consumed);
    }
}

fn data_payload(line: &str) -> Option<&str> {
    let line = line.trim_end_matches('\r');
    let rest = line.strip_prefix("data:")?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// What a relay `data:` payload means to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayRecord {
    Content(String),
    /// Display text for the failure, `details` preferred over `error`.
    Error(String),
    Done,
    /// Well-formed but carries nothing to show (e.g. empty content).
    Ignored,
    /// Unparseable JSON. Logged and skipped.
    Malformed,
}

pub fn classify_relay_record(data: &str) -> RelayRecord {
    let data = data.trim();
    if data == DONE_SENTINEL {
        return RelayRecord::Done;
    }
    if data.is_empty() {
        return RelayRecord::Ignored;
    }

    let payload = match serde_json::from_str::<SsePayload>(data) {
        Ok(payload) => payload,
        Err(error) => {
            emit_sse_parse_error("relay", data, &error);
            return RelayRecord::Malformed;
        }
    };

    if let Some(content) = payload.content.clone().filter(|text| !text.is_empty()) {
        return RelayRecord::Content(content);
    }
    if payload.error.is_some() || payload.details.is_some() {
        let message = payload
            .details
            .filter(|details| !details.trim().is_empty())
            .or(payload.error)
            .unwrap_or_else(|| "unknown error".to_string());
        return RelayRecord::Error(message);
    }
    if payload.is_done_event() {
        return RelayRecord::Done;
    }
    RelayRecord::Ignored
}
