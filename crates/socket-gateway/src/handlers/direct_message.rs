//! Direct message handler
//!
//! Relays a text message to every session of the receiving owner.

use super::{Handler, HandlerError, HandlerResult};
use crate::connection::{Clients, Session};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Payload of a direct message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectMessagePayload {
    #[serde(rename = "receiverId", alias = "receiverID")]
    pub receiver_id: String,
    pub message: String,
}

/// Forwards `message` to the receiver under a configurable action tag
pub struct DirectMessageHandler {
    deliver_as: String,
}

impl DirectMessageHandler {
    /// Tag under which receivers get the message
    pub const DEFAULT_DELIVERY_ACTION: &'static str = "NEW_MESSAGE";

    #[must_use]
    pub fn new(deliver_as: impl Into<String>) -> Self {
        Self {
            deliver_as: deliver_as.into(),
        }
    }
}

impl Default for DirectMessageHandler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELIVERY_ACTION)
    }
}

#[async_trait]
impl Handler for DirectMessageHandler {
    async fn handle(
        &self,
        payload: String,
        session: Arc<Session>,
        clients: Clients,
    ) -> HandlerResult<()> {
        let request: DirectMessagePayload =
            serde_json::from_str(&payload).map_err(|e| HandlerError::invalid_payload(&e))?;

        if request.receiver_id.is_empty() {
            return Err(HandlerError::InvalidPayload(
                "receiverId must not be empty".to_string(),
            ));
        }

        let delivered = clients
            .send(&request.receiver_id, &request.message, &self.deliver_as)
            .await?;

        // An offline receiver is not an error; the message is simply not delivered.
        tracing::debug!(
            session_id = %session.session_id(),
            receiver_id = %request.receiver_id,
            delivered = delivered,
            "Direct message relayed"
        );

        Ok(())
    }
}
