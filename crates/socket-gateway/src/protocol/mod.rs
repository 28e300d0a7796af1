//! Wire protocol definitions
//!
//! Every frame in both directions is a JSON envelope carrying an action tag and an opaque
//! string payload.

mod envelope;
mod tags;

pub use envelope::Envelope;
pub use tags::ActionTag;
