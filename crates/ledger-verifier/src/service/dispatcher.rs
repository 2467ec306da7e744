//! Single-slot event dispatcher.
//!
//! The listener is read at dispatch time, so replacing it mid-session routes
//! every later event to the new listener only.

use crate::domain::LedgerEvent;
use crate::ports::EventListener;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::warn;

#[derive(Default)]
pub struct EventDispatcher {
    listener: RwLock<Option<Arc<dyn EventListener>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the listener; `None` clears it.
    pub fn set_listener(&self, listener: Option<Arc<dyn EventListener>>) {
        *self.listener.write() = listener;
    }

    pub fn has_listener(&self) -> bool {
        self.listener.read().is_some()
    }

    /// Forward `event` to the current listener. Returns `false` when dropped.
    pub fn dispatch(&self, event: LedgerEvent) -> bool {
        // Clone out so the lock is not held while the listener runs.
        let listener = self.listener.read().clone();
        match listener {
            Some(listener) => {
                listener.on_event(event);
                true
            }
            None => {
                warn!(verifier_id = %event.verifier_id, "No event listener registered, dropping event");
                false
            }
        }
    }
}
