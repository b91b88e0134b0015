//! SSE stream handler for the web layer.
//!
//! This module contains only the Axum handler that binds one session to an
//! accepted connection. The core SSE infrastructure (Session, Manager,
//! Registry, wire framing) lives in the `sse` crate.

pub mod handler;
