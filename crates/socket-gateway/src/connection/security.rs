//! Attempt throttle
//!
//! Counts consecutive protocol failures for one session.

/// Per-session failure counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Security {
    attempts_count: u32,
    attempts_allowed: u32,
}

impl Security {
    /// Close the session once `attempts_allowed` consecutive failures are recorded.
    /// Zero never closes.
    #[must_use]
    pub const fn new(attempts_allowed: u32) -> Self {
        Self {
            attempts_count: 0,
            attempts_allowed,
        }
    }

    /// A throttle that never trips
    #[must_use]
    pub const fn unlimited() -> Self {
        Self::new(0)
    }

    /// Record a failure; returns true once the allowance is used up
    pub fn do_attempt(&mut self) -> bool {
        self.attempts_count = self.attempts_count.saturating_add(1);
        self.is_exhausted()
    }

    /// Forget previous failures after a successful dispatch
    pub fn clean_attempts(&mut self) {
        self.attempts_count = 0;
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.attempts_allowed > 0 && self.attempts_count >= self.attempts_allowed
    }

    #[must_use]
    pub const fn attempts_count(&self) -> u32 {
        self.attempts_count
    }

    #[must_use]
    pub const fn attempts_allowed(&self) -> u32 {
        self.attempts_allowed
    }
}

impl Default for Security {
    fn default() -> Self {
        Self::unlimited()
    }
}
