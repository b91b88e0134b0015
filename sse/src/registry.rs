use dashmap::{DashMap, DashSet};
use log::*;
use std::collections::HashSet;
use std::fmt;

/// Unique identifier for a session (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identity-keyed session state shared across the process: the connection
/// set and the subscription map, both with O(1) lookups.
///
/// A session with no subscription entry (or an empty set, which is cleaned
/// up eagerly) has no filter: it still receives untyped events, but typed
/// events are delivered only to subscribed sessions.
pub struct Registry {
    /// Identities of sessions currently connected - O(1)
    connections: DashSet<SessionId>,

    /// Event types each session wants delivered - O(1)
    subscriptions: DashMap<SessionId, HashSet<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            connections: DashSet::new(),
            subscriptions: DashMap::new(),
        }
    }

    /// Mark a session as connected - O(1)
    pub fn connect(&self, session_id: SessionId) {
        self.connections.insert(session_id);
    }

    /// Remove a session and its subscriptions. Returns whether the identity
    /// was present in the connection set - O(1)
    pub fn disconnect(&self, session_id: &SessionId) -> bool {
        self.subscriptions.remove(session_id);
        self.connections.remove(session_id).is_some()
    }

    pub fn is_connected(&self, session_id: &SessionId) -> bool {
        self.connections.contains(session_id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Add `event_type` to the session's subscription set, creating the set
    /// on first subscribe - O(1)
    pub fn subscribe(&self, session_id: &SessionId, event_type: &str) {
        self.subscriptions
            .entry(session_id.clone())
            .or_default()
            .insert(event_type.to_string());
    }

    /// Remove `event_type` from the session's subscription set - O(1)
    pub fn unsubscribe(&self, session_id: &SessionId, event_type: &str) {
        if let Some(mut entry) = self.subscriptions.get_mut(session_id) {
            entry.remove(event_type);

            // Clean up empty subscription entries
            if entry.is_empty() {
                drop(entry); // Release lock before removal
                self.subscriptions.remove(session_id);
                debug!("Removed empty subscription entry for session {session_id}");
            }
        }
    }

    pub fn is_subscribed(&self, session_id: &SessionId, event_type: &str) -> bool {
        self.subscriptions
            .get(session_id)
            .map(|types| types.contains(event_type))
            .unwrap_or(false)
    }

    /// Whether the subscription map holds an entry for this session at all.
    pub fn has_subscription_entry(&self, session_id: &SessionId) -> bool {
        self.subscriptions.contains_key(session_id)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
