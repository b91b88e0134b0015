use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use log::*;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};

use crate::config::SessionConfig;
use crate::error::Error;
use crate::record::{self, Record};
use crate::registry::{Registry, SessionId};
use crate::sink::EventSink;

/// Per-send options for [`Session::send`].
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Event type. Typed sends deliver only to sessions subscribed to the
    /// type; untyped sends always deliver.
    pub event: Option<String>,
    /// Value for the standard `id:` field line.
    pub id: Option<String>,
    /// Per-record reconnection hint, emitted as a `retry:` field line.
    pub retry: Option<u64>,
    /// Acknowledgement id. Appended as an `eventId:` line and marked
    /// acknowledged at send time.
    pub event_id: Option<String>,
}

/// Acknowledgement table: event-id to acknowledged flag.
///
/// Flags only move false to true. Capacity-bounded, oldest entry evicted
/// first; an unpruned table leaks on long-lived high-throughput sessions.
struct AckTable {
    entries: HashMap<String, bool>,
    order: VecDeque<String>,
    capacity: usize,
}

impl AckTable {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Create-or-set the entry for `event_id` to acknowledged.
    fn record(&mut self, event_id: String) {
        if let Some(flag) = self.entries.get_mut(&event_id) {
            *flag = true;
            return;
        }
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(event_id.clone(), true);
        self.order.push_back(event_id);
    }

    /// Flip an existing entry to acknowledged; absent ids are not created.
    fn acknowledge(&mut self, event_id: &str) -> bool {
        match self.entries.get_mut(event_id) {
            Some(flag) => {
                *flag = true;
                true
            }
            None => false,
        }
    }

    fn is_acknowledged(&self, event_id: &str) -> bool {
        self.entries.get(event_id).copied().unwrap_or(false)
    }
}

struct RateState {
    last_send: Option<Instant>,
    count: u32,
}

struct Inner {
    buffer: Vec<String>,
    rate: RateState,
    acks: AckTable,
    rate_reset: Option<JoinHandle<()>>,
}

/// Per-connection SSE session.
///
/// Owns the event buffer, acknowledgement table, rate counters, and
/// heartbeat timer for exactly one client. All sink writes go through one
/// per-session lock, so a heartbeat tick and an application send can never
/// interleave their lines on the wire. Driven externally by the heartbeat
/// timer and by close notifications from the connection; the first close
/// notification wins and every later one (and every later write) is a
/// no-op.
pub struct Session {
    id: SessionId,
    config: SessionConfig,
    sink: Arc<dyn EventSink>,
    registry: Arc<Registry>,
    inner: Mutex<Inner>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    // Handed to the timer tasks so they never keep the session alive
    weak_self: Weak<Session>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Bind a new session to `sink` and start streaming.
    ///
    /// Performs the stream preamble in order: stage the SSE response
    /// headers (plus `Retry` when configured), flush them, emit the
    /// identifying comment when configured. Then starts the heartbeat
    /// timer, registers the close watcher, and marks the session connected.
    pub fn open(
        sink: Arc<dyn EventSink>,
        close_rx: UnboundedReceiver<()>,
        registry: Arc<Registry>,
        config: SessionConfig,
    ) -> Arc<Self> {
        Self::open_with_id(SessionId::new(), sink, close_rx, registry, config)
    }

    pub(crate) fn open_with_id(
        id: SessionId,
        sink: Arc<dyn EventSink>,
        close_rx: UnboundedReceiver<()>,
        registry: Arc<Registry>,
        config: SessionConfig,
    ) -> Arc<Self> {
        for (name, value) in record::RESPONSE_HEADERS {
            sink.set_header(name, value);
        }
        if let Some(retry) = config.retry {
            sink.set_header(record::RETRY_HEADER, &retry.to_string());
        }
        sink.flush_headers();

        if let Some(id_comment) = &config.id {
            sink.write(&record::comment(id_comment));
        }

        let max_acknowledgements = config.max_acknowledgements;
        let session = Arc::new_cyclic(|weak| Self {
            id,
            config,
            sink,
            registry: registry.clone(),
            inner: Mutex::new(Inner {
                buffer: Vec::new(),
                rate: RateState {
                    last_send: None,
                    count: 0,
                },
                acks: AckTable::new(max_acknowledgements),
                rate_reset: None,
            }),
            heartbeat: Mutex::new(None),
            closed: AtomicBool::new(false),
            weak_self: weak.clone(),
        });

        session.spawn_heartbeat();
        session.spawn_close_watcher(close_rx);
        registry.connect(session.id.clone());

        debug!("Opened SSE session {}", session.id);
        session
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Emit one event.
    ///
    /// Policy drops are silent: a send arriving inside the throttle window,
    /// a send past the per-second ceiling, and a typed send the session is
    /// not subscribed to all return `Ok` without writing anything. This is
    /// a drop policy, not a queue; the event is lost. A payload that cannot
    /// be serialized is the one caller-visible failure, and nothing is
    /// written for it.
    pub fn send<T>(&self, data: &T, options: SendOptions) -> Result<(), Error>
    where
        T: Serialize + ?Sized,
    {
        if self.is_closed() {
            debug!("Ignoring send on closed session {}", self.id);
            return Ok(());
        }

        let mut inner = self.inner.lock();

        let now = Instant::now();
        if self.config.throttle_ms > 0 {
            if let Some(last_send) = inner.rate.last_send {
                if now.duration_since(last_send) < Duration::from_millis(self.config.throttle_ms) {
                    debug!("Throttled send on session {}", self.id);
                    return Ok(());
                }
            }
        }
        if inner.rate.count >= self.config.max_requests_per_second {
            debug!("Rate ceiling reached on session {}; dropping send", self.id);
            return Ok(());
        }

        if let Some(event_type) = &options.event {
            if !self.registry.is_subscribed(&self.id, event_type) {
                debug!(
                    "Session {} not subscribed to '{event_type}'; dropping send",
                    self.id
                );
                return Ok(());
            }
        }

        let payload = serde_json::to_string(data)?;

        if let Some(event_id) = &options.event_id {
            inner.acks.record(event_id.clone());
        }

        let lines = Record {
            event: options.event,
            id: options.id,
            data: payload,
            retry: options.retry,
            event_id: options.event_id,
        }
        .lines();

        if inner.buffer.len() + lines.len() > self.config.buffer_size {
            self.flush(&mut inner);
        }
        inner.buffer.extend(lines);
        self.flush(&mut inner);

        inner.rate.last_send = Some(now);
        inner.rate.count += 1;
        if inner.rate.count >= self.config.max_requests_per_second {
            self.schedule_rate_reset(&mut inner);
        }

        Ok(())
    }

    /// Write a comment record directly to the sink, bypassing the buffer,
    /// throttle, rate limit, and subscription checks.
    pub fn comment(&self, text: &str) {
        if self.is_closed() {
            return;
        }
        self.write_comment(text);
    }

    /// Flip an existing acknowledgement entry to true. Absent ids are a
    /// no-op; unlike the implicit acknowledgement inside `send`, this never
    /// creates an entry. Returns whether the entry existed.
    pub fn acknowledge(&self, event_id: &str) -> bool {
        self.inner.lock().acks.acknowledge(event_id)
    }

    pub fn is_acknowledged(&self, event_id: &str) -> bool {
        self.inner.lock().acks.is_acknowledged(event_id)
    }

    /// Add `event_type` to this session's subscription set.
    pub fn subscribe(&self, event_type: &str) {
        debug!("Session {} subscribing to '{event_type}'", self.id);
        self.registry.subscribe(&self.id, event_type);
    }

    /// Remove `event_type` from this session's subscription set.
    pub fn unsubscribe(&self, event_type: &str) {
        debug!("Session {} unsubscribing from '{event_type}'", self.id);
        self.registry.unsubscribe(&self.id, event_type);
    }

    /// Handle a close notification. Only the first call acts: it stops the
    /// heartbeat, cancels any pending rate-counter reset, invokes the
    /// `on_close` callback, and removes the session from the connection
    /// set, emitting a reconnect notice if it was present.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(handle) = self.heartbeat.lock().take() {
            handle.abort();
        }
        {
            let mut inner = self.inner.lock();
            if let Some(handle) = inner.rate_reset.take() {
                handle.abort();
            }
            inner.buffer.clear();
        }

        if let Some(callback) = &self.config.on_close {
            callback();
        }

        if self.registry.disconnect(&self.id) {
            self.write_comment(record::RECONNECTING_COMMENT);
        }

        debug!("Closed SSE session {}", self.id);
    }

    /// Write the buffered lines to the sink as one contiguous chunk, then
    /// clear the buffer. Called with the session lock held.
    fn flush(&self, inner: &mut Inner) {
        if inner.buffer.is_empty() {
            return;
        }
        let mut chunk = inner.buffer.join("\n");
        chunk.push('\n');
        self.sink.write(&chunk);
        inner.buffer.clear();
    }

    fn write_comment(&self, text: &str) {
        let _guard = self.inner.lock();
        self.sink.write(&record::comment(text));
    }

    fn spawn_heartbeat(&self) {
        let weak = self.weak_self.clone();
        let period = Duration::from_millis(self.config.heartbeat_interval_ms);
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(session) = weak.upgrade() else {
                    break;
                };
                if session.is_closed() {
                    break;
                }
                session.write_comment(record::HEARTBEAT_COMMENT);
                if let Some(callback) = &session.config.heartbeat_callback {
                    callback();
                }
            }
        });
        *self.heartbeat.lock() = Some(handle);
    }

    fn spawn_close_watcher(&self, mut close_rx: UnboundedReceiver<()>) {
        let weak = self.weak_self.clone();
        tokio::spawn(async move {
            while close_rx.recv().await.is_some() {
                match weak.upgrade() {
                    Some(session) => session.close(),
                    None => break,
                }
            }
        });
    }

    /// One-shot reset of the per-second counter, 1s from the moment the
    /// ceiling was hit (a fixed delay, not a wall-clock aligned window).
    fn schedule_rate_reset(&self, inner: &mut Inner) {
        let weak = self.weak_self.clone();
        let handle = tokio::spawn(async move {
            time::sleep(Duration::from_secs(1)).await;
            if let Some(session) = weak.upgrade() {
                let mut inner = session.inner.lock();
                inner.rate.count = 0;
                inner.rate_reset = None;
                debug!("Rate counter reset on session {}", session.id);
            }
        });
        inner.rate_reset = Some(handle);
    }

    #[cfg(test)]
    pub(crate) fn heartbeat_running(&self) -> bool {
        self.heartbeat.lock().is_some()
    }

    #[cfg(test)]
    pub(crate) fn rate_reset_pending(&self) -> bool {
        self.inner.lock().rate_reset.is_some()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handle) = self.heartbeat.lock().take() {
            handle.abort();
        }
        if let Some(handle) = self.inner.lock().rate_reset.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::RecordingSink;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc::{self, UnboundedSender};
    use tokio::task::yield_now;

    struct Harness {
        session: Arc<Session>,
        sink: Arc<RecordingSink>,
        registry: Arc<Registry>,
        close_tx: UnboundedSender<()>,
    }

    fn open_session(config: SessionConfig) -> Harness {
        let sink = RecordingSink::new();
        let registry = Arc::new(Registry::new());
        let (close_tx, close_rx) = mpsc::unbounded_channel();
        let session = Session::open(sink.clone(), close_rx, registry.clone(), config);
        Harness {
            session,
            sink,
            registry,
            close_tx,
        }
    }

    async fn settle() {
        yield_now().await;
        yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn preamble_stages_headers_in_order_before_any_record() {
        let harness = open_session(SessionConfig::default().with_retry(3000).with_id("s1"));

        assert!(harness.sink.headers_flushed());
        assert_eq!(
            harness.sink.headers(),
            vec![
                ("Content-Type".to_string(), "text/event-stream".to_string()),
                ("Cache-Control".to_string(), "no-cache".to_string()),
                ("Connection".to_string(), "keep-alive".to_string()),
                ("Retry".to_string(), "3000".to_string()),
            ]
        );
        // Only the identifying comment has been written so far
        assert_eq!(harness.sink.writes(), vec![": s1\n\n".to_string()]);
        assert!(harness.registry.is_connected(harness.session.id()));
    }

    #[tokio::test(start_paused = true)]
    async fn send_composes_a_complete_record_and_leaves_the_buffer_empty() {
        let harness = open_session(SessionConfig::default());

        harness
            .session
            .send(&serde_json::json!({"message": "hi"}), SendOptions::default())
            .unwrap();
        harness
            .session
            .send(&serde_json::json!({"message": "again"}), SendOptions::default())
            .unwrap();

        // One contiguous chunk per send, each a fully terminated record
        let writes = harness.sink.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], "data: {\"message\":\"hi\"}\n\n");
        assert_eq!(writes[1], "data: {\"message\":\"again\"}\n\n");
    }

    #[tokio::test(start_paused = true)]
    async fn typed_sends_deliver_only_when_subscribed() {
        let harness = open_session(SessionConfig::default());
        let options = || SendOptions {
            event: Some("status".to_string()),
            ..Default::default()
        };

        harness.session.send(&"dropped", options()).unwrap();
        assert_eq!(harness.sink.write_count(), 0);

        harness.session.subscribe("status");
        harness.session.send(&"delivered", options()).unwrap();
        assert_eq!(
            harness.sink.writes(),
            vec!["event: status\ndata: \"delivered\"\n\n".to_string()]
        );

        harness.session.unsubscribe("status");
        harness.session.send(&"dropped again", options()).unwrap();
        assert_eq!(harness.sink.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn untyped_sends_ignore_subscription_state() {
        let harness = open_session(SessionConfig::default());

        harness.session.send(&"hello", SendOptions::default()).unwrap();
        assert_eq!(harness.sink.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribing_the_last_type_drops_the_registry_entry() {
        let harness = open_session(SessionConfig::default());

        harness.session.subscribe("a");
        harness.session.unsubscribe("a");

        assert!(!harness
            .registry
            .has_subscription_entry(harness.session.id()));
    }

    #[tokio::test(start_paused = true)]
    async fn sends_inside_the_throttle_window_are_dropped() {
        let harness = open_session(SessionConfig::default().with_throttle_ms(100));

        harness.session.send(&"one", SendOptions::default()).unwrap();
        time::advance(Duration::from_millis(50)).await;
        harness.session.send(&"two", SendOptions::default()).unwrap();
        assert_eq!(harness.sink.write_count(), 1);

        time::advance(Duration::from_millis(50)).await;
        harness.session.send(&"three", SendOptions::default()).unwrap();
        assert_eq!(harness.sink.write_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sends_past_the_rate_ceiling_are_dropped_until_the_reset() {
        let harness = open_session(SessionConfig::default().with_max_requests_per_second(2));

        harness.session.send(&"one", SendOptions::default()).unwrap();
        harness.session.send(&"two", SendOptions::default()).unwrap();
        harness.session.send(&"three", SendOptions::default()).unwrap();
        assert_eq!(harness.sink.write_count(), 2);
        assert!(harness.session.rate_reset_pending());

        settle().await;
        time::advance(Duration::from_secs(1)).await;
        settle().await;

        assert!(!harness.session.rate_reset_pending());
        harness.session.send(&"four", SendOptions::default()).unwrap();
        assert_eq!(harness.sink.write_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn sending_with_an_event_id_acknowledges_it_immediately() {
        let harness = open_session(SessionConfig::default());

        harness
            .session
            .send(
                &"payload",
                SendOptions {
                    event_id: Some("e1".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(harness.session.is_acknowledged("e1"));
        assert_eq!(
            harness.sink.writes(),
            vec!["data: \"payload\"\neventId: e1\n\n".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn acknowledge_never_creates_entries() {
        let harness = open_session(SessionConfig::default());

        assert!(!harness.session.acknowledge("missing"));
        assert!(!harness.session.is_acknowledged("missing"));
    }

    #[tokio::test(start_paused = true)]
    async fn acknowledgement_table_evicts_oldest_beyond_capacity() {
        let harness = open_session(SessionConfig::default().with_max_acknowledgements(2));

        for event_id in ["e1", "e2", "e3"] {
            harness
                .session
                .send(
                    &"payload",
                    SendOptions {
                        event_id: Some(event_id.to_string()),
                        ..Default::default()
                    },
                )
                .unwrap();
        }

        assert!(!harness.session.is_acknowledged("e1"));
        assert!(harness.session.is_acknowledged("e2"));
        assert!(harness.session.is_acknowledged("e3"));
    }

    #[tokio::test(start_paused = true)]
    async fn unserializable_payloads_fail_without_writing() {
        struct Unserializable;

        impl Serialize for Unserializable {
            fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                Err(serde::ser::Error::custom("unserializable payload"))
            }
        }

        let harness = open_session(SessionConfig::default());

        let result = harness.session.send(&Unserializable, SendOptions::default());
        assert!(result.is_err());
        assert_eq!(harness.sink.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeats_fire_on_the_configured_period() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let harness = open_session(
            SessionConfig::default()
                .with_heartbeat_interval_ms(15_000)
                .with_heartbeat_callback(Arc::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })),
        );

        settle().await;
        time::advance(Duration::from_millis(15_000)).await;
        settle().await;

        assert_eq!(harness.sink.writes(), vec![": heartbeat\n\n".to_string()]);
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        time::advance(Duration::from_millis(15_000)).await;
        settle().await;
        assert_eq!(harness.sink.write_count(), 2);
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn comments_bypass_throttle_and_subscription_checks() {
        let harness = open_session(
            SessionConfig::default()
                .with_throttle_ms(1_000)
                .with_max_requests_per_second(1),
        );

        harness.session.send(&"one", SendOptions::default()).unwrap();
        harness.session.comment("keep-alive");
        harness.session.comment("debug note");

        assert_eq!(harness.sink.write_count(), 3);
        assert_eq!(harness.sink.writes()[1], ": keep-alive\n\n");
    }

    #[tokio::test(start_paused = true)]
    async fn first_close_notification_wins_and_cancels_timers() {
        let closes = Arc::new(AtomicUsize::new(0));
        let counter = closes.clone();
        let harness = open_session(
            SessionConfig::default()
                .with_max_requests_per_second(1)
                .with_on_close(Arc::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })),
        );

        // Leave a pending rate reset behind, then close twice
        harness.session.send(&"one", SendOptions::default()).unwrap();
        assert!(harness.session.rate_reset_pending());

        harness.close_tx.send(()).unwrap();
        harness.close_tx.send(()).unwrap();
        settle().await;

        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(harness.session.is_closed());
        assert!(!harness.session.heartbeat_running());
        assert!(!harness.session.rate_reset_pending());
        assert!(!harness.registry.is_connected(harness.session.id()));
    }

    #[tokio::test(start_paused = true)]
    async fn close_emits_the_reconnect_notice_once() {
        let harness = open_session(SessionConfig::default());

        harness.session.close();
        harness.session.close();

        let writes = harness.sink.writes();
        assert_eq!(writes, vec![": Reconnecting...\n\n".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn no_heartbeats_after_close() {
        let harness = open_session(SessionConfig::default().with_heartbeat_interval_ms(15_000));

        harness.session.close();
        let writes_at_close = harness.sink.write_count();

        time::advance(Duration::from_millis(45_000)).await;
        settle().await;

        assert_eq!(harness.sink.write_count(), writes_at_close);
    }

    #[tokio::test(start_paused = true)]
    async fn writes_after_close_are_no_ops() {
        let harness = open_session(SessionConfig::default());

        harness.session.close();
        let writes_at_close = harness.sink.write_count();

        harness
            .session
            .send(&"late", SendOptions::default())
            .unwrap();
        harness.session.comment("late comment");

        assert_eq!(harness.sink.write_count(), writes_at_close);
    }
}
