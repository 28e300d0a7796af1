//! Sample pipeline: `BROADCAST` → `NOTIFY_ALL`
//!
//! The action stamps the sender onto the text; the trigger writes it to every live session.

use super::{ActionHandler, Fanout, Trigger, TriggerHandler};
use crate::connection::Session;
use crate::handlers::{HandlerError, HandlerResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Data handed from [`BroadcastAction`] to [`NotifyAllTrigger`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub from: String,
    pub message: String,
}

/// Turns a non-empty text into a `NOTIFY_ALL` trigger
#[derive(Debug, Default)]
pub struct BroadcastAction;

impl BroadcastAction {
    pub const ACTION: &'static str = "BROADCAST";
    pub const TRIGGER: &'static str = "NOTIFY_ALL";
}

#[async_trait]
impl ActionHandler for BroadcastAction {
    async fn execute(&self, data: String, session: Arc<Session>) -> HandlerResult<Trigger> {
        if data.trim().is_empty() {
            return Err(HandlerError::InvalidPayload(
                "broadcast message must not be empty".to_string(),
            ));
        }

        let notice = Notice {
            from: session.owner_id().to_string(),
            message: data,
        };
        let data = serde_json::to_string(&notice).map_err(|e| HandlerError::Internal(e.into()))?;

        Ok(Trigger::new(Self::TRIGGER, data))
    }
}

/// Writes the notice to every session in the snapshot
#[derive(Debug)]
pub struct NotifyAllTrigger {
    deliver_as: String,
}

impl NotifyAllTrigger {
    pub const DEFAULT_DELIVERY_ACTION: &'static str = "NOTICE";

    #[must_use]
    pub fn new(deliver_as: impl Into<String>) -> Self {
        Self {
            deliver_as: deliver_as.into(),
        }
    }
}

impl Default for NotifyAllTrigger {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELIVERY_ACTION)
    }
}

#[async_trait]
impl TriggerHandler for NotifyAllTrigger {
    async fn execute(
        &self,
        data: String,
        origin: Arc<Session>,
        sessions: Vec<Arc<Session>>,
    ) -> HandlerResult<Fanout> {
        let mut fanout = Fanout::default();

        for session in &sessions {
            let result = session.send(data.as_str(), self.deliver_as.as_str()).await;
            if let Err(e) = &result {
                tracing::debug!(
                    session_id = %session.session_id(),
                    error = %e,
                    "Notice not delivered"
                );
            }
            fanout.record(session, result);
        }

        tracing::debug!(
            origin = %origin.session_id(),
            recipients = sessions.len(),
            delivered = fanout.delivered,
            "Notice fanned out"
        );

        Ok(fanout)
    }
}
