//! # socket-gateway
//!
//! WebSocket session layer: owner-keyed session registry, per-connection receive loop,
//! named message handlers, an action→trigger pipeline, and a lossy hook bus for observing
//! connection lifecycle.

pub mod connection;
pub mod handlers;
pub mod hooks;
pub mod pipeline;
pub mod protocol;
pub mod server;

pub use connection::{Clients, Security, Session, SessionError};
pub use handlers::{Handler, HandlerError, HandlerResult, Handlers};
pub use hooks::{Hook, HookBus, HookType};
pub use pipeline::{
    ActionHandler, DeliveryFailure, Fanout, Pipeline, PipelineError, Processed, Trigger,
    TriggerHandler,
};
pub use protocol::{ActionTag, Envelope};
pub use server::{create_app, create_router, run, serve, serve_with_shutdown, App, AppBuilder};
