//! A single live connection
//!
//! Owns the write half of the socket. Frames are written under a per-session lock so the
//! session's own receive loop and other sessions' fan-out never interleave on the wire.

use super::{Security, SessionError};
use crate::protocol::Envelope;
use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Write half of a connection
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;

/// One connected peer
pub struct Session {
    /// Owner (user) id, shared by all of the owner's devices
    owner_id: String,

    /// Unique per physical connection
    session_id: String,

    /// Serialized writer
    sink: Mutex<FrameSink>,

    /// Consecutive protocol failures
    security: parking_lot::Mutex<Security>,

    closed: AtomicBool,

    created_at: Instant,
}

impl Session {
    /// Wrap a connection
    pub fn with_security<S>(owner_id: impl Into<String>, sink: S, security: Security) -> Arc<Self>
    where
        S: Sink<Message, Error = axum::Error> + Send + 'static,
    {
        Arc::new(Self {
            owner_id: owner_id.into(),
            session_id: Self::generate_id(),
            sink: Mutex::new(Box::pin(sink)),
            security: parking_lot::Mutex::new(security),
            closed: AtomicBool::new(false),
            created_at: Instant::now(),
        })
    }

    /// Generate a new session ID
    #[must_use]
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Get connection age
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Write one envelope
    pub async fn send_envelope(&self, envelope: &Envelope) -> Result<(), SessionError> {
        let json = envelope.to_json()?;

        let mut sink = self.sink.lock().await;
        if self.is_closed() {
            return Err(SessionError::Closed(self.session_id.clone()));
        }
        sink.send(Message::Text(json)).await?;

        tracing::trace!(
            session_id = %self.session_id,
            action = %envelope.action,
            "Frame sent"
        );

        Ok(())
    }

    /// Write a payload under the given action tag
    pub async fn send(
        &self,
        payload: impl Into<String>,
        action: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.send_envelope(&Envelope::new(action, payload)).await
    }

    /// Write a transport-level ping; the peer's pong counts as activity
    pub async fn ping(&self) -> Result<(), SessionError> {
        let mut sink = self.sink.lock().await;
        if self.is_closed() {
            return Err(SessionError::Closed(self.session_id.clone()));
        }
        sink.send(Message::Ping(Vec::new())).await?;

        tracing::trace!(session_id = %self.session_id, "Ping sent");
        Ok(())
    }

    /// Send the `USER_ID` handshake carrying the owner id
    pub async fn handshake(&self) -> Result<(), SessionError> {
        self.send_envelope(&Envelope::user_id(&self.owner_id))
            .await
            .map_err(|e| SessionError::Handshake(Box::new(e)))
    }

    /// Close the write half; later sends fail with [`SessionError::Closed`]
    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = sink.close().await {
            tracing::debug!(
                session_id = %self.session_id,
                error = %e,
                "Error while closing connection"
            );
        }
    }

    /// Record a protocol failure; returns true once the throttle trips
    pub fn record_failure(&self) -> bool {
        self.security.lock().do_attempt()
    }

    /// Reset the throttle after a successful dispatch
    pub fn reset_attempts(&self) {
        self.security.lock().clean_attempts();
    }

    /// Snapshot of the throttle state
    pub fn security(&self) -> Security {
        *self.security.lock()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("owner_id", &self.owner_id)
            .field("session_id", &self.session_id)
            .field("security", &self.security())
            .field("closed", &self.is_closed())
            .finish()
    }
}
