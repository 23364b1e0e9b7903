//! Handle returned when registering a channel subscriber.
//!
//! [`SubscriptionId`] is a newtype wrapper around [`uuid::Uuid`] (v4) so a
//! handle can be passed back to `off` without comparing closures.

use std::fmt;

use serde::Serialize;

/// Identifies one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SubscriptionId(uuid::Uuid);

impl SubscriptionId {
    /// Creates a new random `SubscriptionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
