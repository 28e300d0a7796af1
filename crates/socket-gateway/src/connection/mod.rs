//! Connection management
//!
//! Sessions, their abuse throttle, and the owner-keyed registry used for fan-out.

mod error;
mod registry;
mod security;
mod session;

pub use error::SessionError;
pub use registry::Clients;
pub use security::Security;
pub use session::{FrameSink, Session};
