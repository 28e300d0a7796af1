//! Frame dispatch
//!
//! Decodes one inbound frame, routes it to a direct handler or the pipeline, reports failures
//! to the peer and the hook bus, and keeps the session's attempt throttle current.

use super::App;
use crate::connection::Session;
use crate::handlers::HandlerError;
use crate::hooks::HookType;
use crate::pipeline::PipelineError;
use crate::protocol::Envelope;
use std::sync::Arc;
use thiserror::Error;

/// What the receive loop does after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    /// The attempt allowance is used up; the session must end
    Throttled,
}

/// Why a decoded envelope was not handled
#[derive(Debug, Error)]
pub(crate) enum DispatchError {
    #[error("cannot define handler: {0}")]
    UnknownAction(String),

    #[error("handler {action} failed: {source}")]
    Handler {
        action: String,
        #[source]
        source: HandlerError,
    },

    #[error(transparent)]
    Pipeline(PipelineError),
}

impl From<PipelineError> for DispatchError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::UnknownAction(action) => Self::UnknownAction(action),
            other => Self::Pipeline(other),
        }
    }
}

/// Process one raw frame for a session
pub(crate) async fn dispatch_frame(app: &App, session: &Arc<Session>, frame: &[u8]) -> Flow {
    let envelope = match Envelope::from_slice(frame) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(
                session_id = %session.session_id(),
                error = %e,
                "Failed to decode frame"
            );
            reply(app, session, Envelope::decode_error(&e)).await;
            return record_failure(session);
        }
    };

    tracing::trace!(
        session_id = %session.session_id(),
        action = %envelope.action,
        "Received frame"
    );

    match route(app, session, envelope).await {
        Ok(()) => {
            session.reset_attempts();
            Flow::Continue
        }
        Err(e) => {
            tracing::warn!(
                owner_id = %session.owner_id(),
                session_id = %session.session_id(),
                error = %e,
                "Dispatch failed"
            );
            let message = e.to_string();
            app.hooks().emit(HookType::Error, message.as_str());
            reply(app, session, Envelope::handler_error(message)).await;
            record_failure(session)
        }
    }
}

async fn route(app: &App, session: &Arc<Session>, envelope: Envelope) -> Result<(), DispatchError> {
    if let Some(handler) = app.handlers().define_handler(&envelope.action) {
        let Envelope { action, payload } = envelope;
        return handler
            .handle(payload, session.clone(), app.clients().clone())
            .await
            .map_err(|source| DispatchError::Handler { action, source });
    }

    match app.pipeline() {
        Some(pipeline) => {
            let processed = pipeline.process(envelope, session, app.clients()).await?;
            // Unreachable recipients are reported but never charged to the sender.
            for failure in processed.fanout.failures {
                app.hooks().emit(
                    HookType::Error,
                    format!(
                        "cannot send message to {} ({}): {}",
                        failure.session_id, processed.trigger.trigger_type, failure.error
                    ),
                );
            }
            Ok(())
        }
        None => Err(DispatchError::UnknownAction(envelope.action)),
    }
}

/// Best-effort write of a protocol reply
async fn reply(app: &App, session: &Session, envelope: Envelope) {
    if let Err(e) = session.send_envelope(&envelope).await {
        tracing::debug!(
            session_id = %session.session_id(),
            action = %envelope.action,
            error = %e,
            "Failed to send reply"
        );
        app.hooks().emit(
            HookType::Error,
            format!("cannot send message ({envelope}): {e}"),
        );
    }
}

fn record_failure(session: &Session) -> Flow {
    if session.record_failure() {
        Flow::Throttled
    } else {
        Flow::Continue
    }
}
