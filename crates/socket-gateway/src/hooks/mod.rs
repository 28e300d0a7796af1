//! Hook (event) bus
//!
//! Connection lifecycle is observable only through hooks. Publishing never blocks: a hook reaches
//! the subscribers present at publish time and is dropped when nobody listens.

mod bus;

pub use bus::{Hook, HookBus, HookSubscription, HookType};
