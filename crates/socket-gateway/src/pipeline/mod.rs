//! Action → trigger pipeline
//!
//! A command is first resolved to an [`ActionHandler`], which runs domain logic for the
//! originating session and names the trigger to fire next. The trigger is then resolved to a
//! [`TriggerHandler`], which performs side effects against every live session. Both tables are
//! flat lists scanned in registration order; the first match wins.

mod broadcast;
mod error;

pub use broadcast::{BroadcastAction, Notice, NotifyAllTrigger};
pub use error::PipelineError;

use crate::connection::{Clients, Session, SessionError};
use crate::handlers::HandlerResult;
use crate::protocol::Envelope;
use async_trait::async_trait;
use std::sync::Arc;

/// What an action wants fired next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub trigger_type: String,
    pub data: String,
}

impl Trigger {
    #[must_use]
    pub fn new(trigger_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            trigger_type: trigger_type.into(),
            data: data.into(),
        }
    }
}

/// A recipient the trigger could not reach
#[derive(Debug)]
pub struct DeliveryFailure {
    pub session_id: String,
    pub error: SessionError,
}

/// Per-recipient outcome of a trigger
#[derive(Debug, Default)]
pub struct Fanout {
    pub delivered: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl Fanout {
    /// Count one write result against a recipient
    pub fn record(&mut self, session: &Session, result: Result<(), SessionError>) {
        match result {
            Ok(()) => self.delivered += 1,
            Err(error) => self.failures.push(DeliveryFailure {
                session_id: session.session_id().to_string(),
                error,
            }),
        }
    }
}

/// A command that went through both stages
#[derive(Debug)]
pub struct Processed {
    pub trigger: Trigger,
    pub fanout: Fanout,
}

/// First stage: validate a command and derive the trigger
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(&self, data: String, session: Arc<Session>) -> HandlerResult<Trigger>;
}

/// Second stage: perform the side effect, possibly across sessions
///
/// Writes that fail for individual recipients go into the returned [`Fanout`] instead of failing
/// the whole trigger.
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    async fn execute(
        &self,
        data: String,
        origin: Arc<Session>,
        sessions: Vec<Arc<Session>>,
    ) -> HandlerResult<Fanout>;
}

struct ActionRoute {
    action_type: String,
    handler: Arc<dyn ActionHandler>,
}

struct TriggerRoute {
    trigger_type: String,
    handler: Arc<dyn TriggerHandler>,
}

/// Registered actions and triggers
#[derive(Default)]
pub struct Pipeline {
    actions: Vec<ActionRoute>,
    triggers: Vec<TriggerRoute>,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action handler
    #[must_use]
    pub fn on_action(
        mut self,
        action_type: impl Into<String>,
        handler: impl ActionHandler + 'static,
    ) -> Self {
        self.actions.push(ActionRoute {
            action_type: action_type.into(),
            handler: Arc::new(handler),
        });
        self
    }

    /// Register a trigger handler
    #[must_use]
    pub fn on_trigger(
        mut self,
        trigger_type: impl Into<String>,
        handler: impl TriggerHandler + 'static,
    ) -> Self {
        self.triggers.push(TriggerRoute {
            trigger_type: trigger_type.into(),
            handler: Arc::new(handler),
        });
        self
    }

    /// First action registered for the type
    pub fn define_action(&self, action_type: &str) -> Option<Arc<dyn ActionHandler>> {
        self.actions
            .iter()
            .find(|route| route.action_type == action_type)
            .map(|route| route.handler.clone())
    }

    /// First trigger registered for the type
    pub fn define_trigger(&self, trigger_type: &str) -> Option<Arc<dyn TriggerHandler>> {
        self.triggers
            .iter()
            .find(|route| route.trigger_type == trigger_type)
            .map(|route| route.handler.clone())
    }

    /// Run one command through both stages
    ///
    /// Returns the trigger that fired with its per-recipient outcome. The trigger sees a snapshot
    /// of every session live at the moment the action finished.
    pub async fn process(
        &self,
        command: Envelope,
        session: &Arc<Session>,
        clients: &Clients,
    ) -> Result<Processed, PipelineError> {
        let Envelope {
            action: action_type,
            payload: data,
        } = command;

        let action = self
            .define_action(&action_type)
            .ok_or_else(|| PipelineError::UnknownAction(action_type.clone()))?;

        let trigger = action
            .execute(data, session.clone())
            .await
            .map_err(|source| PipelineError::Action {
                action: action_type.clone(),
                source,
            })?;

        let trigger_handler = self.define_trigger(&trigger.trigger_type).ok_or_else(|| {
            PipelineError::UnknownTrigger {
                action: action_type.clone(),
                trigger: trigger.trigger_type.clone(),
            }
        })?;

        let fanout = trigger_handler
            .execute(trigger.data.clone(), session.clone(), clients.all_sessions())
            .await
            .map_err(|source| PipelineError::Trigger {
                trigger: trigger.trigger_type.clone(),
                source,
            })?;

        tracing::debug!(
            session_id = %session.session_id(),
            action = %action_type,
            trigger = %trigger.trigger_type,
            delivered = fanout.delivered,
            failed = fanout.failures.len(),
            "Command processed"
        );

        Ok(Processed { trigger, fanout })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field(
                "actions",
                &self.actions.iter().map(|r| &r.action_type).collect::<Vec<_>>(),
            )
            .field(
                "triggers",
                &self.triggers.iter().map(|r| &r.trigger_type).collect::<Vec<_>>(),
            )
            .finish()
    }
}
