//! Registry of open sessions.

use std::sync::Arc;

use dashmap::DashMap;

use super::Session;

/// Open sessions keyed by session id.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new registry wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a session. Returns the shared handle.
    pub fn register(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        self.sessions
            .insert(session.id().to_string(), session.clone());
        tracing::debug!(
            session = %session.id(),
            active_sessions = self.sessions.len(),
            "Session registered"
        );
        session
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Remove and close a session.
    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(id)?;
        session.close();
        Some(session)
    }

    /// Close every session, e.g. on shutdown.
    pub fn close_all(&self) {
        for entry in self.sessions.iter() {
            entry.value().close();
        }
        self.sessions.clear();
    }

    /// Get the number of open sessions.
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}
