use std::fmt::Write as _;

/// Response headers staged once at stream start, in this order.
pub const RESPONSE_HEADERS: [(&str, &str); 3] = [
    ("Content-Type", "text/event-stream"),
    ("Cache-Control", "no-cache"),
    ("Connection", "keep-alive"),
];

/// Header carrying the client reconnection hint, staged only when configured.
pub const RETRY_HEADER: &str = "Retry";

/// Comment text written on every heartbeat tick.
pub const HEARTBEAT_COMMENT: &str = "heartbeat";

/// Comment text written when a closing session is removed from the
/// connection set.
pub const RECONNECTING_COMMENT: &str = "Reconnecting...";

/// One SSE record: a group of field lines terminated by a blank line.
///
/// Field lines are emitted in a fixed order: `event:`, `id:`, `data:`,
/// `retry:`, `eventId:`. Only `data:` is unconditional. The payload is
/// single-line JSON, so no field line can contain a raw newline.
#[derive(Debug, Clone, Default)]
pub struct Record {
    /// Event type; present only on typed sends.
    pub event: Option<String>,
    /// Value for the standard `id:` field.
    pub id: Option<String>,
    /// JSON payload for the `data:` field.
    pub data: String,
    /// Per-record reconnection hint in milliseconds.
    pub retry: Option<u64>,
    /// Acknowledgement id, emitted as a non-standard `eventId:` field.
    pub event_id: Option<String>,
}

impl Record {
    /// Render the record as wire lines, ending with the empty line that
    /// separates records. Joining the lines with `\n` plus a trailing `\n`
    /// yields the exact bytes for the sink.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(6);
        if let Some(event) = &self.event {
            lines.push(format!("event: {event}"));
        }
        if let Some(id) = &self.id {
            lines.push(format!("id: {id}"));
        }
        lines.push(format!("data: {}", self.data));
        if let Some(retry) = self.retry {
            lines.push(format!("retry: {retry}"));
        }
        if let Some(event_id) = &self.event_id {
            lines.push(format!("eventId: {event_id}"));
        }
        lines.push(String::new());
        lines
    }
}

/// Render a complete comment record: `: <text>` followed by the record
/// separator.
pub fn comment(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let _ = write!(out, ": {text}\n\n");
    out
}
