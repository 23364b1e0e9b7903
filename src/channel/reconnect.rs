//! Bounded fixed-delay reconnect policy.
//!
//! [`ReconnectPolicy`] owns the attempt counter and the single pending
//! reconnect task. The delay is the same for every attempt.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::ChannelConfig;

/// Attempt budget plus the currently scheduled reconnect, if any.
#[derive(Debug)]
pub struct ReconnectPolicy {
    delay: Duration,
    max_attempts: u32,
    attempts: u32,
    pending: Option<JoinHandle<()>>,
}

impl ReconnectPolicy {
    /// Creates a policy with a fresh budget.
    #[must_use]
    pub const fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
            attempts: 0,
            pending: None,
        }
    }

    /// Creates a policy from channel settings.
    #[must_use]
    pub const fn from_config(config: &ChannelConfig) -> Self {
        Self::new(config.reconnect_delay, config.max_reconnect_attempts)
    }

    /// Delay before each attempt.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Attempts allowed before giving up.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Attempts made since the last reset.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns `true` once every attempt has been used.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Claims the next attempt, returning its 1-based number.
    ///
    /// Returns `None` when the budget is exhausted.
    pub fn next_attempt(&mut self) -> Option<u32> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts = self.attempts.saturating_add(1);
        Some(self.attempts)
    }

    /// Zeroes the attempt counter.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Stores the task that will perform the next attempt, aborting any
    /// previously pending one.
    pub fn arm(&mut self, task: JoinHandle<()>) {
        self.cancel();
        self.pending = Some(task);
    }

    /// Aborts the pending attempt. Returns `true` if one was still waiting.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(task) => {
                let waiting = !task.is_finished();
                task.abort();
                waiting
            }
            None => false,
        }
    }

    /// Returns `true` while a scheduled attempt has not fired yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|task| !task.is_finished())
    }
}
