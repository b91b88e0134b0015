use std::fmt;
use std::sync::Arc;

/// Callback invoked exactly once, at the first close notification.
pub type CloseCallback = Arc<dyn Fn() + Send + Sync>;

/// Callback invoked once per heartbeat tick, after the heartbeat is written.
pub type HeartbeatCallback = Arc<dyn Fn() + Send + Sync>;

/// Period between keep-alive comments. This is the single default; there is
/// no secondary fallback inside the timer path.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 15_000;

/// Max buffered wire lines before a forced flush.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Minimum spacing between accepted sends; 0 disables throttling.
pub const DEFAULT_THROTTLE_MS: u64 = 0;

/// Ceiling on sends per rolling 1-second window.
pub const DEFAULT_MAX_REQUESTS_PER_SECOND: u32 = 50;

/// Acknowledgement table capacity; oldest entries are evicted beyond it.
pub const DEFAULT_MAX_ACKNOWLEDGEMENTS: usize = 4096;

/// Per-session configuration, applied at construction.
#[derive(Clone)]
pub struct SessionConfig {
    pub heartbeat_interval_ms: u64,
    /// Default event-type label. Reserved; dispatch does not consult it.
    pub event: Option<String>,
    /// Client reconnection hint, written once as the `Retry` header.
    pub retry: Option<u64>,
    /// Session-identifying comment emitted once at stream start.
    pub id: Option<String>,
    pub buffer_size: usize,
    pub throttle_ms: u64,
    pub max_requests_per_second: u32,
    pub max_acknowledgements: usize,
    pub on_close: Option<CloseCallback>,
    pub heartbeat_callback: Option<HeartbeatCallback>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            event: None,
            retry: None,
            id: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            throttle_ms: DEFAULT_THROTTLE_MS,
            max_requests_per_second: DEFAULT_MAX_REQUESTS_PER_SECOND,
            max_acknowledgements: DEFAULT_MAX_ACKNOWLEDGEMENTS,
            on_close: None,
            heartbeat_callback: None,
        }
    }
}

impl SessionConfig {
    pub fn with_heartbeat_interval_ms(mut self, interval_ms: u64) -> Self {
        self.heartbeat_interval_ms = interval_ms;
        self
    }

    pub fn with_retry(mut self, retry_ms: u64) -> Self {
        self.retry = Some(retry_ms);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_throttle_ms(mut self, throttle_ms: u64) -> Self {
        self.throttle_ms = throttle_ms;
        self
    }

    pub fn with_max_requests_per_second(mut self, ceiling: u32) -> Self {
        self.max_requests_per_second = ceiling;
        self
    }

    pub fn with_max_acknowledgements(mut self, capacity: usize) -> Self {
        self.max_acknowledgements = capacity;
        self
    }

    pub fn with_on_close(mut self, callback: CloseCallback) -> Self {
        self.on_close = Some(callback);
        self
    }

    pub fn with_heartbeat_callback(mut self, callback: HeartbeatCallback) -> Self {
        self.heartbeat_callback = Some(callback);
        self
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("heartbeat_interval_ms", &self.heartbeat_interval_ms)
            .field("event", &self.event)
            .field("retry", &self.retry)
            .field("id", &self.id)
            .field("buffer_size", &self.buffer_size)
            .field("throttle_ms", &self.throttle_ms)
            .field("max_requests_per_second", &self.max_requests_per_second)
            .field("max_acknowledgements", &self.max_acknowledgements)
            .field("on_close", &self.on_close.is_some())
            .field("heartbeat_callback", &self.heartbeat_callback.is_some())
            .finish()
    }
}
