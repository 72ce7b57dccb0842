//! Engine events.
//!
//! The engine does not own persistence, so hosts feed it change
//! notifications: item upserts/removals and rule set publishes. The bus
//! fans each event out to registered handlers; the engine wires its
//! shortlist-cache invalidation through here.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A change notification relevant to engine caches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    /// An item was added or updated in a user's wardrobe.
    ItemUpserted { user_id: String, item_id: String },
    /// An item was removed from a user's wardrobe.
    ItemRemoved { user_id: String, item_id: String },
    /// A new rule set version was published.
    RuleSetPublished { version: u64 },
}

impl EngineEvent {
    /// The user a wardrobe event concerns, if any.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            EngineEvent::ItemUpserted { user_id, .. }
            | EngineEvent::ItemRemoved { user_id, .. } => Some(user_id),
            EngineEvent::RuleSetPublished { .. } => None,
        }
    }
}

/// A registered event handler.
pub type EventHandler = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// Opaque handle for unregistering a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerToken(u64);

static HANDLER_TOKEN_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Synchronous fan-out bus for [`EngineEvent`]s.
///
/// Handlers run inline on the emitting thread in registration order;
/// invalidation work is cheap enough that no dispatch queue is needed.
#[derive(Default)]
pub struct EngineEventBus {
    handlers: RwLock<Vec<(HandlerToken, EventHandler)>>,
}

impl fmt::Debug for EngineEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineEventBus")
            .field("handlers", &self.handlers.read().len())
            .finish()
    }
}

impl EngineEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; returns a token usable with
    /// [`EngineEventBus::unregister`].
    pub fn register(&self, handler: EventHandler) -> HandlerToken {
        let token = HandlerToken(HANDLER_TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push((token, handler));
        token
    }

    /// Remove a previously registered handler.
    pub fn unregister(&self, token: HandlerToken) {
        self.handlers.write().retain(|(t, _)| *t != token);
    }

    /// Dispatch an event to every registered handler.
    pub fn emit(&self, event: &EngineEvent) {
        let handlers: Vec<EventHandler> = self
            .handlers
            .read()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }
}
