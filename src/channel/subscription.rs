//! Per-channel subscription registry.
//!
//! Tracks which handlers are registered for each [`EventKind`] and delivers
//! events to them in registration order.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::domain::{ChannelEvent, EventKind, SubscriptionId};

/// Callback invoked for every event of the kind it was registered for.
pub type EventHandler = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

/// Ordered handler lists keyed by event kind.
#[derive(Default)]
pub struct SubscriptionRegistry {
    handlers: HashMap<EventKind, Vec<(SubscriptionId, EventHandler)>>,
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<EventKind, usize> = self
            .handlers
            .iter()
            .map(|(kind, list)| (*kind, list.len()))
            .collect();
        f.debug_struct("SubscriptionRegistry")
            .field("handlers", &counts)
            .finish()
    }
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler for `kind` and returns its handle.
    pub fn subscribe(&mut self, kind: EventKind, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.handlers.entry(kind).or_default().push((id, handler));
        id
    }

    /// Removes one handler, or every handler for `kind` when `id` is `None`.
    ///
    /// Returns the number of handlers removed.
    pub fn unsubscribe(&mut self, kind: EventKind, id: Option<SubscriptionId>) -> usize {
        let Some(id) = id else {
            return self.handlers.remove(&kind).map_or(0, |list| list.len());
        };

        let Some(list) = self.handlers.get_mut(&kind) else {
            return 0;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = before.saturating_sub(list.len());
        if list.is_empty() {
            self.handlers.remove(&kind);
        }
        removed
    }

    /// Returns a snapshot of the handlers for `kind`, in registration order.
    ///
    /// The snapshot lets callers release the registry before invoking
    /// handlers, so a handler may itself subscribe or unsubscribe.
    #[must_use]
    pub fn handlers_for(&self, kind: EventKind) -> Vec<EventHandler> {
        self.handlers
            .get(&kind)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    /// Returns the number of handlers registered for `kind`.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Returns the number of handlers across all kinds.
    #[must_use]
    pub fn total(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    /// Removes every handler.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

/// Invokes each handler with `event`, isolating panics.
///
/// A panicking handler is logged and skipped; the remaining handlers still
/// run. Returns the number of handlers that completed normally.
pub fn deliver(handlers: &[EventHandler], event: &ChannelEvent) -> usize {
    let mut delivered = 0;
    for handler in handlers {
        match catch_unwind(AssertUnwindSafe(|| handler(event))) {
            Ok(()) => delivered += 1,
            Err(_) => {
                tracing::error!(event = %event.kind(), "event handler panicked; skipping");
            }
        }
    }
    delivered
}
