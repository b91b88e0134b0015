use crate::config::SessionConfig;
use crate::error::{Error, ErrorKind};
use crate::registry::{Registry, SessionId};
use crate::session::Session;
use crate::sink::EventSink;
use dashmap::DashMap;
use log::*;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Opens sessions with process-wide defaults and addresses live sessions by
/// identity, so application code can invoke the session operations on a
/// connection it did not construct itself.
pub struct Manager {
    registry: Arc<Registry>,
    sessions: DashMap<SessionId, Arc<Session>>,
    defaults: SessionConfig,
}

impl Manager {
    pub fn new(defaults: SessionConfig) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            sessions: DashMap::new(),
            defaults,
        }
    }

    /// Open a new session bound to `sink` using the process defaults.
    pub fn open_session(
        &self,
        sink: Arc<dyn EventSink>,
        close_rx: UnboundedReceiver<()>,
    ) -> Arc<Session> {
        self.open_session_with(sink, close_rx, self.defaults.clone())
    }

    /// Open a new session with an explicit configuration. When the
    /// configuration names no `id` comment, the generated identity is used,
    /// so the stream's opening comment tells the client how to address the
    /// session.
    pub fn open_session_with(
        &self,
        sink: Arc<dyn EventSink>,
        close_rx: UnboundedReceiver<()>,
        mut config: SessionConfig,
    ) -> Arc<Session> {
        let session_id = SessionId::new();
        if config.id.is_none() {
            config.id = Some(session_id.to_string());
        }

        let session = Session::open_with_id(
            session_id.clone(),
            sink,
            close_rx,
            self.registry.clone(),
            config,
        );
        self.sessions.insert(session_id, session.clone());
        info!("Registered new SSE session");
        session
    }

    pub fn get(&self, session_id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    /// Lookup that surfaces `SessionNotFound` for the web layer.
    pub fn find(&self, session_id: &SessionId) -> Result<Arc<Session>, Error> {
        self.get(session_id).ok_or_else(|| Error {
            source: None,
            error_kind: ErrorKind::SessionNotFound,
        })
    }

    /// Close a session and drop its handle.
    pub fn close_session(&self, session_id: &SessionId) {
        if let Some((_, session)) = self.sessions.remove(session_id) {
            info!("Unregistering SSE session");
            session.close();
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::RecordingSink;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn open_session_registers_a_handle_under_its_identity() {
        let manager = Manager::default();
        let sink = RecordingSink::new();
        let (_close_tx, close_rx) = mpsc::unbounded_channel();

        let session = manager.open_session(sink, close_rx);

        assert_eq!(manager.session_count(), 1);
        let found = manager.get(session.id()).unwrap();
        assert_eq!(found.id(), session.id());
    }

    #[tokio::test(start_paused = true)]
    async fn open_session_announces_the_generated_identity() {
        let manager = Manager::default();
        let sink = RecordingSink::new();
        let (_close_tx, close_rx) = mpsc::unbounded_channel();

        let session = manager.open_session(sink.clone(), close_rx);

        assert_eq!(sink.writes(), vec![format!(": {}\n\n", session.id())]);
    }

    #[tokio::test(start_paused = true)]
    async fn an_explicit_id_comment_is_left_alone() {
        let manager = Manager::default();
        let sink = RecordingSink::new();
        let (_close_tx, close_rx) = mpsc::unbounded_channel();

        manager.open_session_with(
            sink.clone(),
            close_rx,
            SessionConfig::default().with_id("custom"),
        );

        assert_eq!(sink.writes(), vec![": custom\n\n".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn find_reports_unknown_identities() {
        let manager = Manager::default();

        let result = manager.find(&SessionId::new());
        assert_eq!(result.unwrap_err().error_kind, ErrorKind::SessionNotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn close_session_closes_and_forgets_the_handle() {
        let manager = Manager::default();
        let sink = RecordingSink::new();
        let (_close_tx, close_rx) = mpsc::unbounded_channel();

        let session = manager.open_session(sink, close_rx);
        let session_id = session.id().clone();

        manager.close_session(&session_id);

        assert!(session.is_closed());
        assert_eq!(manager.session_count(), 0);
        assert!(manager.get(&session_id).is_none());
    }
}
