//! Message handlers
//!
//! Maps action tags to handlers. The table is filled before the server accepts connections and
//! only read afterwards, so every receive loop can look handlers up concurrently.

mod direct_message;
mod error;

pub use direct_message::{DirectMessageHandler, DirectMessagePayload};
pub use error::{HandlerError, HandlerResult};

use crate::connection::{Clients, Session};
use crate::protocol::ActionTag;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Processes the payload of one inbound envelope
///
/// Runs to completion before the owning session reads its next frame.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(
        &self,
        payload: String,
        session: Arc<Session>,
        clients: Clients,
    ) -> HandlerResult<()>;
}

/// Adapter turning an async closure into a [`Handler`]
pub struct HandlerFn<F> {
    f: F,
}

/// Build a handler from an async closure
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(String, Arc<Session>, Clients) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<()>> + Send + 'static,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(String, Arc<Session>, Clients) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<()>> + Send + 'static,
{
    async fn handle(
        &self,
        payload: String,
        session: Arc<Session>,
        clients: Clients,
    ) -> HandlerResult<()> {
        (self.f)(payload, session, clients).await
    }
}

/// Action tag → handler table
#[derive(Clone, Default)]
pub struct Handlers {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl Handlers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the tag
    pub fn register(&mut self, action: impl Into<String>, handler: impl Handler + 'static) {
        let action = action.into();
        if ActionTag::is_reserved(&action) {
            tracing::warn!(action = %action, "Handler registered for a reserved tag");
        }
        if self
            .handlers
            .insert(action.clone(), Arc::new(handler))
            .is_some()
        {
            tracing::warn!(action = %action, "Handler replaced");
        }
    }

    /// Builder-style [`Self::register`]
    #[must_use]
    pub fn with(mut self, action: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.register(action, handler);
        self
    }

    /// Look up the handler for an action tag
    pub fn define_handler(&self, action: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(action).cloned()
    }

    /// Registered tags, sorted
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handlers")
            .field("actions", &self.actions())
            .finish()
    }
}
