//! Handler error types

use crate::connection::SessionError;
use thiserror::Error;

/// Handler error type
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Invalid payload received
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The payload named a target that cannot be reached
    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    /// Writing to a session failed
    #[error("Send failed: {0}")]
    Send(#[from] SessionError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    /// Build an invalid-payload error from a JSON decode failure
    pub fn invalid_payload(err: &serde_json::Error) -> Self {
        Self::InvalidPayload(err.to_string())
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
