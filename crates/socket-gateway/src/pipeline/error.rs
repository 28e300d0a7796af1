//! Pipeline error types

use crate::handlers::HandlerError;
use thiserror::Error;

/// Why a command did not complete its action→trigger cycle
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot define action: {0}")]
    UnknownAction(String),

    #[error("cannot define trigger {trigger} (fired by {action})")]
    UnknownTrigger { action: String, trigger: String },

    #[error("action {action} failed: {source}")]
    Action {
        action: String,
        #[source]
        source: HandlerError,
    },

    #[error("trigger {trigger} failed: {source}")]
    Trigger {
        trigger: String,
        #[source]
        source: HandlerError,
    },
}
