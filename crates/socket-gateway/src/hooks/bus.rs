//! Hook bus and subscriptions

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError};

/// Default per-subscriber buffer
pub const DEFAULT_HOOK_BUFFER: usize = 256;

/// Hook types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HookType {
    /// A session completed its handshake and was registered; data is the owner id
    ClientAdded,
    /// The peer closed its connection
    ClientClosedConnection,
    /// Transport failure, unresolved action, throttle, or idle timeout
    Error,
    /// The listener is bound and accepting connections
    ServerStarted,
}

impl HookType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientAdded => "CLIENT_ADDED",
            Self::ClientClosedConnection => "CLIENT_CLOSED_CONNECTION",
            Self::Error => "ERROR",
            Self::ServerStarted => "SERVER_STARTED",
        }
    }
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observability event
#[derive(Debug, Clone, Serialize)]
pub struct Hook {
    #[serde(rename = "type")]
    pub hook_type: HookType,
    pub data: String,
    pub occurred_at: DateTime<Utc>,
}

impl Hook {
    #[must_use]
    pub fn new(hook_type: HookType, data: impl Into<String>) -> Self {
        Self {
            hook_type,
            data: data.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Process-wide event channel owned by the server
///
/// Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct HookBus {
    sender: broadcast::Sender<Hook>,
}

impl HookBus {
    /// Create a bus whose subscribers each buffer up to `capacity` hooks
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to hooks published from now on
    #[must_use]
    pub fn subscribe(&self) -> HookSubscription {
        HookSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Publish a hook without waiting
    ///
    /// Returns the number of subscribers it was delivered to; 0 means it was dropped.
    pub fn emit(&self, hook_type: HookType, data: impl Into<String>) -> usize {
        let hook = Hook::new(hook_type, data);
        match self.sender.send(hook) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(hook)) => {
                tracing::trace!(hook = %hook.hook_type, "Hook dropped, no subscribers");
                0
            }
        }
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for HookBus {
    fn default() -> Self {
        Self::new(DEFAULT_HOOK_BUFFER)
    }
}

impl fmt::Debug for HookBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

/// Receiving end of the hook bus
pub struct HookSubscription {
    receiver: broadcast::Receiver<Hook>,
}

impl HookSubscription {
    /// Wait for the next hook
    ///
    /// A subscriber that falls behind loses the oldest hooks and keeps receiving. Returns
    /// `None` once every bus handle is gone.
    pub async fn recv(&mut self) -> Option<Hook> {
        loop {
            match self.receiver.recv().await {
                Ok(hook) => return Some(hook),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped = skipped, "Hook subscriber lagged, hooks lost");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Wait for the next hook of the given type, discarding others
    pub async fn recv_type(&mut self, hook_type: HookType) -> Option<Hook> {
        while let Some(hook) = self.recv().await {
            if hook.hook_type == hook_type {
                return Some(hook);
            }
        }
        None
    }

    /// Take a hook if one is already buffered
    pub fn try_recv(&mut self) -> Option<Hook> {
        loop {
            match self.receiver.try_recv() {
                Ok(hook) => return Some(hook),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }
}
