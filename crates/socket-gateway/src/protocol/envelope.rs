//! Envelope format
//!
//! Inbound frames may use either `action`/`payload` or the pipeline spelling
//! `actionType`/`data`; outbound frames always use `action`/`payload`.

use super::ActionTag;
use serde::{Deserialize, Serialize};

/// The unit exchanged over a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope")]
pub struct Envelope {
    /// Action tag used for routing
    pub action: String,

    /// Handler-specific payload, forwarded verbatim
    pub payload: String,
}

/// Inbound shape before the two spellings are merged
///
/// `action` wins over `actionType` and `payload` over `data`; a missing or null payload is empty.
#[derive(Deserialize)]
struct RawEnvelope {
    action: Option<String>,
    #[serde(rename = "actionType")]
    action_type: Option<String>,
    payload: Option<String>,
    data: Option<String>,
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = &'static str;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        let action = raw
            .action
            .or(raw.action_type)
            .ok_or("missing field `action`")?;

        Ok(Self {
            action,
            payload: raw.payload.or(raw.data).unwrap_or_default(),
        })
    }
}

impl Envelope {
    /// Create an envelope
    #[must_use]
    pub fn new(action: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            payload: payload.into(),
        }
    }

    /// Handshake carrying the owner id
    #[must_use]
    pub fn user_id(owner_id: &str) -> Self {
        Self::new(ActionTag::UserId, owner_id)
    }

    /// Report an undecodable frame back to the peer
    #[must_use]
    pub fn decode_error(err: &serde_json::Error) -> Self {
        Self::new(
            ActionTag::ErrDecode,
            format!("cannot decode your message: {err}"),
        )
    }

    /// Report an unresolved action back to the peer
    #[must_use]
    pub fn handler_error(message: impl Into<String>) -> Self {
        Self::new(ActionTag::ErrHandler, message)
    }

    /// Check whether this envelope carries the given reserved tag
    #[must_use]
    pub fn is(&self, tag: ActionTag) -> bool {
        self.action == tag.as_str()
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Deserialize from raw bytes (binary frames)
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Envelope(action={}, {} bytes)", self.action, self.payload.len())
    }
}
