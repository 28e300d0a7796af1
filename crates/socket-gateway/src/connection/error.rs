//! Session error types

use thiserror::Error;

/// Errors raised while writing to a session
#[derive(Debug, Error)]
pub enum SessionError {
    /// The underlying connection failed
    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),

    /// The envelope could not be serialized
    #[error("cannot encode envelope: {0}")]
    Encode(#[from] serde_json::Error),

    /// The session was already closed
    #[error("session {0} is closed")]
    Closed(String),

    /// The USER_ID handshake could not be delivered
    #[error("cannot send USER_ID: {0}")]
    Handshake(#[source] Box<SessionError>),
}
