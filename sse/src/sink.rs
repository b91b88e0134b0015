use log::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::UnboundedSender;

/// Transport seam between a session and the response that carries it.
///
/// A session stages headers, flushes them, then writes wire chunks. Each
/// chunk is one complete record or comment and must reach the transport as
/// a contiguous unit. Writes are fire-and-forget: a sink whose far end is
/// gone must swallow the write rather than surface an error, because the
/// session layer treats late writes as no-ops.
pub trait EventSink: Send + Sync + 'static {
    /// Stage a response header. Called only before `flush_headers`.
    fn set_header(&self, name: &str, value: &str);

    /// Mark the staged headers as final so the transport can emit them
    /// before any record.
    fn flush_headers(&self);

    /// Write one contiguous chunk of wire text.
    fn write(&self, chunk: &str);
}

/// Sink backed by a tokio unbounded channel.
///
/// The web layer owns the receiving half and drains it into the response
/// body; headers are staged here for the handler to copy onto the response
/// it builds.
pub struct ChannelSink {
    sender: UnboundedSender<String>,
    headers: Mutex<Vec<(String, String)>>,
    headers_flushed: AtomicBool,
}

impl ChannelSink {
    pub fn new(sender: UnboundedSender<String>) -> Self {
        Self {
            sender,
            headers: Mutex::new(Vec::new()),
            headers_flushed: AtomicBool::new(false),
        }
    }

    /// The staged headers, in staging order.
    pub fn headers(&self) -> Vec<(String, String)> {
        self.headers.lock().clone()
    }

    pub fn headers_flushed(&self) -> bool {
        self.headers_flushed.load(Ordering::Acquire)
    }

    /// Resolves when the receiving half has been dropped, i.e. the client
    /// went away.
    pub async fn closed(&self) {
        let sender = self.sender.clone();
        sender.closed().await;
    }
}

impl EventSink for ChannelSink {
    fn set_header(&self, name: &str, value: &str) {
        self.headers.lock().push((name.to_string(), value.to_string()));
    }

    fn flush_headers(&self) {
        self.headers_flushed.store(true, Ordering::Release);
    }

    fn write(&self, chunk: &str) {
        if self.sender.send(chunk.to_string()).is_err() {
            debug!("Dropped write to a closed SSE stream");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Arc;

    /// Sink that records header staging and writes for assertions.
    pub(crate) struct RecordingSink {
        headers: Mutex<Vec<(String, String)>>,
        headers_flushed: AtomicBool,
        writes: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self {
                headers: Mutex::new(Vec::new()),
                headers_flushed: AtomicBool::new(false),
                writes: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn headers(&self) -> Vec<(String, String)> {
            self.headers.lock().clone()
        }

        pub(crate) fn headers_flushed(&self) -> bool {
            self.headers_flushed.load(Ordering::Acquire)
        }

        pub(crate) fn writes(&self) -> Vec<String> {
            self.writes.lock().clone()
        }

        pub(crate) fn write_count(&self) -> usize {
            self.writes.lock().len()
        }
    }

    impl EventSink for RecordingSink {
        fn set_header(&self, name: &str, value: &str) {
            self.headers.lock().push((name.to_string(), value.to_string()));
        }

        fn flush_headers(&self) {
            self.headers_flushed.store(true, Ordering::Release);
        }

        fn write(&self, chunk: &str) {
            self.writes.lock().push(chunk.to_string());
        }
    }
}
