//! Error types for the `sse` crate.
use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for the session layer.
///
/// Policy suppressions (throttled, rate-limited, not-subscribed sends) and
/// writes after close are NOT errors; operations treat them as silent
/// no-ops. Only faults the caller must see surface here: a payload that
/// cannot be serialized, or an identity that names no live session. The
/// `source` field holds the originating error so the web layer can log it
/// while mapping `error_kind` to a status code.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// The kinds of errors the session layer can surface.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// The event payload could not be serialized to JSON. Nothing was
    /// written to the stream.
    Serialization,
    /// No live session exists for the given identity.
    SessionNotFound,
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SSE Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Serialization,
        }
    }
}
