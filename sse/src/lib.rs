//! Server-Sent Events (SSE) session management.
//!
//! This crate owns the per-connection session layer: it turns one long-lived
//! HTTP response into a framed, one-directional event stream and applies
//! application-level policy on top of the raw wire format.
//!
//! # Architecture
//!
//! - **One session per connection**: each accepted connection gets its own
//!   [`session::Session`] with its own buffer, acknowledgement table, rate
//!   counters, and heartbeat timer. Sessions never share mutable state.
//! - **Identity-keyed registry**: the connection set and subscription map
//!   live in a [`registry::Registry`] with O(1) DashMap lookups, keyed by
//!   the server-generated [`registry::SessionId`].
//! - **Policy before the wire**: throttling, the per-second rate ceiling,
//!   and subscription filtering all run before a record is composed;
//!   suppressed sends are silent drops, not errors.
//! - **Transport-agnostic**: the session writes through the
//!   [`sink::EventSink`] trait. The web layer supplies a channel-backed sink;
//!   tests supply a recording one.
//!
//! # Stream lifecycle
//!
//! 1. The transport hands the manager a sink and a close-notification
//!    channel.
//! 2. The session stages the SSE response headers, flushes them, and emits
//!    its identifying comment.
//! 3. Application code drives `send`/`comment`/`subscribe`/`unsubscribe`/
//!    `acknowledge` over the connection's lifetime; the heartbeat timer
//!    keeps the stream alive in between.
//! 4. The first close notification stops the timers, runs the close
//!    callback, and removes the session from the connection set. Later
//!    notifications and writes are no-ops.
//!
//! # Modules
//!
//! - `config`: per-session configuration and defaults
//! - `error`: kind-tree error type for caller-visible failures
//! - `manager`: process-wide session handle map and construction defaults
//! - `record`: SSE wire record and comment framing
//! - `registry`: connection set and subscription map
//! - `session`: the per-connection state machine
//! - `sink`: transport seam and the channel-backed implementation

pub mod config;
pub mod error;
pub mod manager;
pub mod record;
pub mod registry;
pub mod session;
pub mod sink;

pub use config::SessionConfig;
pub use manager::Manager;
pub use registry::SessionId;
pub use session::{SendOptions, Session};
pub use sink::{ChannelSink, EventSink};
