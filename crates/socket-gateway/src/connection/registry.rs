//! Client registry
//!
//! Maps owner ids to the owner's live sessions (one per device). A single mutex guards the map;
//! it is held only to copy or mutate references, never across a network write.

use super::{Session, SessionError};
use crate::protocol::Envelope;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Owner-keyed session registry
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct Clients {
    storage: Arc<Mutex<HashMap<String, Vec<Arc<Session>>>>>,
}

impl Clients {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its owner id
    ///
    /// Returns false if this session is already registered.
    pub fn add(&self, session: Arc<Session>) -> bool {
        let mut storage = self.storage.lock();
        let sessions = storage.entry(session.owner_id().to_string()).or_default();

        if sessions
            .iter()
            .any(|s| s.session_id() == session.session_id())
        {
            return false;
        }

        tracing::debug!(
            owner_id = %session.owner_id(),
            session_id = %session.session_id(),
            owner_sessions = sessions.len() + 1,
            "Session added"
        );
        sessions.push(session);

        true
    }

    /// Deregister one session; the owner entry disappears with its last session
    pub fn remove(&self, owner_id: &str, session_id: &str) -> Option<Arc<Session>> {
        let mut storage = self.storage.lock();
        let sessions = storage.get_mut(owner_id)?;

        let position = sessions.iter().position(|s| s.session_id() == session_id)?;
        let removed = sessions.remove(position);

        if sessions.is_empty() {
            storage.remove(owner_id);
        }

        tracing::debug!(
            owner_id = %owner_id,
            session_id = %session_id,
            "Session removed"
        );

        Some(removed)
    }

    /// Snapshot of an owner's sessions, in registration order
    pub fn sessions(&self, owner_id: &str) -> Vec<Arc<Session>> {
        self.storage
            .lock()
            .get(owner_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of every live session
    pub fn all_sessions(&self) -> Vec<Arc<Session>> {
        self.storage.lock().values().flatten().cloned().collect()
    }

    /// Check whether a session is registered
    pub fn contains(&self, owner_id: &str, session_id: &str) -> bool {
        self.storage
            .lock()
            .get(owner_id)
            .is_some_and(|sessions| sessions.iter().any(|s| s.session_id() == session_id))
    }

    /// Total number of live sessions
    pub fn session_count(&self) -> usize {
        self.storage.lock().values().map(Vec::len).sum()
    }

    /// Number of owners with at least one session
    pub fn owner_count(&self) -> usize {
        self.storage.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.lock().is_empty()
    }

    /// Write a frame to every session of an owner
    ///
    /// Unknown owners are a no-op. The first failed write aborts the call and is returned;
    /// sessions written before it keep their frame. Returns the number of sessions written.
    pub async fn send(
        &self,
        owner_id: &str,
        payload: &str,
        action: &str,
    ) -> Result<usize, SessionError> {
        let recipients = self.sessions(owner_id);
        let sent = Self::deliver(&recipients, &Envelope::new(action, payload)).await?;

        tracing::trace!(
            owner_id = %owner_id,
            action = %action,
            sent = sent,
            "Message sent to owner sessions"
        );

        Ok(sent)
    }

    /// Write a frame to every live session, with the same failure semantics as [`Self::send`]
    pub async fn broadcast(&self, payload: &str, action: &str) -> Result<usize, SessionError> {
        let recipients = self.all_sessions();
        let sent = Self::deliver(&recipients, &Envelope::new(action, payload)).await?;

        tracing::debug!(action = %action, sent = sent, "Message broadcast to all sessions");

        Ok(sent)
    }

    async fn deliver(recipients: &[Arc<Session>], envelope: &Envelope) -> Result<usize, SessionError> {
        let mut sent = 0;
        for session in recipients {
            session.send_envelope(envelope).await?;
            sent += 1;
        }
        Ok(sent)
    }
}

impl std::fmt::Debug for Clients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let storage = self.storage.lock();
        f.debug_struct("Clients")
            .field("owners", &storage.len())
            .field("sessions", &storage.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}
