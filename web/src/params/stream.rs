use serde::Deserialize;
use serde_json::Value;
use sse::SendOptions;

/// Request body for posting one event onto a session's stream.
#[derive(Debug, Deserialize)]
pub struct SendEventParams {
    /// The event payload, forwarded verbatim as the `data:` field.
    pub data: Value,
    /// Event type; typed events reach only subscribed sessions.
    pub event: Option<String>,
    /// Value for the standard `id:` field.
    pub id: Option<String>,
    /// Per-record reconnection hint in milliseconds.
    pub retry: Option<u64>,
    /// Acknowledgement id, recorded as acknowledged at send time.
    pub event_id: Option<String>,
}

impl SendEventParams {
    pub fn send_options(&self) -> SendOptions {
        SendOptions {
            event: self.event.clone(),
            id: self.id.clone(),
            retry: self.retry,
            event_id: self.event_id.clone(),
        }
    }
}

/// Request body for writing a comment record.
#[derive(Debug, Deserialize)]
pub struct CommentParams {
    pub text: String,
}
