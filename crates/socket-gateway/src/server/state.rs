//! Server state
//!
//! Everything a connection needs, shared by every receive loop.

use crate::connection::{Clients, Security};
use crate::handlers::{Handler, Handlers};
use crate::hooks::HookBus;
use crate::pipeline::Pipeline;
use socket_common::{AppConfig, JwtVerifier};
use std::sync::Arc;

/// Shared application state
///
/// Handler tables are frozen once built; the registry and hook bus are shared handles.
#[derive(Clone)]
pub struct App {
    handlers: Arc<Handlers>,
    pipeline: Option<Arc<Pipeline>>,
    clients: Clients,
    hooks: HookBus,
    config: Arc<AppConfig>,
    /// Present when owner ids come from bearer tokens
    jwt: Option<JwtVerifier>,
}

impl App {
    /// Start building an app from configuration
    #[must_use]
    pub fn builder(config: AppConfig) -> AppBuilder {
        AppBuilder::new(config)
    }

    pub fn handlers(&self) -> &Handlers {
        &self.handlers
    }

    pub fn pipeline(&self) -> Option<&Pipeline> {
        self.pipeline.as_deref()
    }

    /// Live session registry
    pub fn clients(&self) -> &Clients {
        &self.clients
    }

    /// Hook bus the server publishes to
    pub fn hooks(&self) -> &HookBus {
        &self.hooks
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn jwt(&self) -> Option<&JwtVerifier> {
        self.jwt.as_ref()
    }

    /// Fresh throttle for a new session
    pub(crate) fn security(&self) -> Security {
        Security::new(self.config.session.attempts_allowed)
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("handlers", &self.handlers)
            .field("pipeline", &self.pipeline)
            .field("clients", &self.clients)
            .field("hooks", &self.hooks)
            .field("jwt", &self.jwt.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`App`]
pub struct AppBuilder {
    config: AppConfig,
    handlers: Handlers,
    pipeline: Option<Pipeline>,
    hooks: Option<HookBus>,
}

impl AppBuilder {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            handlers: Handlers::new(),
            pipeline: None,
            hooks: None,
        }
    }

    /// Register a direct handler for an action tag
    #[must_use]
    pub fn handler(mut self, action: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.handlers.register(action, handler);
        self
    }

    /// Replace the whole handler table
    #[must_use]
    pub fn handlers(mut self, handlers: Handlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Route tags without a direct handler through a pipeline
    #[must_use]
    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Publish to an existing bus instead of a new one
    #[must_use]
    pub fn hooks(mut self, hooks: HookBus) -> Self {
        self.hooks = Some(hooks);
        self
    }

    #[must_use]
    pub fn build(self) -> App {
        let hooks = self
            .hooks
            .unwrap_or_else(|| HookBus::new(self.config.session.hook_buffer));
        let jwt = self
            .config
            .jwt
            .secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .map(JwtVerifier::new);

        App {
            handlers: Arc::new(self.handlers),
            pipeline: self.pipeline.map(Arc::new),
            clients: Clients::new(),
            hooks,
            config: Arc::new(self.config),
            jwt,
        }
    }
}
