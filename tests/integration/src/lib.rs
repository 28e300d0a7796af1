//! Integration test utilities for the socket gateway
//!
//! Spawns a real gateway on an ephemeral port and drives it with WebSocket and HTTP clients.

pub mod helpers;

pub use helpers::*;
