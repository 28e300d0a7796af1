//! Reserved action tags
//!
//! Application handlers may use any other tag.

use std::fmt;

/// Action tags the server itself sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionTag {
    /// Handshake, payload is the owner id the session was registered under
    UserId,
    /// The inbound frame was not a valid envelope
    ErrDecode,
    /// No handler (or action/trigger) could process the inbound frame
    ErrHandler,
}

impl ActionTag {
    /// Get the wire representation of the tag
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserId => "USER_ID",
            Self::ErrDecode => "ERR_DECODE",
            Self::ErrHandler => "ERR_HANDLER",
        }
    }

    /// Check whether an inbound tag collides with a reserved one
    #[must_use]
    pub fn is_reserved(tag: &str) -> bool {
        [Self::UserId, Self::ErrDecode, Self::ErrHandler]
            .iter()
            .any(|t| t.as_str() == tag)
    }
}

impl fmt::Display for ActionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ActionTag> for String {
    fn from(tag: ActionTag) -> Self {
        tag.as_str().to_string()
    }
}
