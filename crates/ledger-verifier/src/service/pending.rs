//! Pending Response Table - request-id routing for a shared connection.
//!
//! Under `ConnectionPolicy::Shared` many synchronous calls wait on one
//! connection. Each call registers its request id and gets a receiver; the
//! connection's router task hands every `response` to the receiver whose id
//! matches.
//!
//! Flow:
//! 1. Call obtains a `RequestId`
//! 2. Call invokes `register()` to get a receiver
//! 3. Call sends the request carrying the id
//! 4. Router receives the response and calls `route()`
//! 5. Call awaits the receiver until its deadline, then `remove()`s the id

use crate::domain::{InboundMessage, RequestId, TransportError};
use crate::ports::TransportEvent;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Per-waiter queue depth. A waiter only ever needs the first match.
const WAITER_CAPACITY: usize = 4;

/// Statistics for the pending table
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total waiters registered
    pub total_registered: AtomicU64,
    /// Responses delivered to a waiter
    pub total_routed: AtomicU64,
    /// Responses with no waiting id
    pub total_unmatched: AtomicU64,
}

/// Request id → waiting call.
#[derive(Default)]
pub struct PendingResponses {
    pending: DashMap<RequestId, mpsc::Sender<TransportEvent>>,
    stats: PendingStats,
}

impl PendingResponses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `id`.
    pub fn register(&self, id: RequestId) -> mpsc::Receiver<TransportEvent> {
        let (tx, rx) = mpsc::channel(WAITER_CAPACITY);
        debug!(request_id = %id, "Registered pending response");
        self.pending.insert(id, tx);
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
        rx
    }

    /// Drop the waiter for `id`, if any.
    pub fn remove(&self, id: &RequestId) {
        self.pending.remove(id);
    }

    /// Route one inbound event. Errors fail every waiter.
    pub fn route(&self, event: TransportEvent) {
        match event {
            TransportEvent::Message(InboundMessage::Response(response)) => {
                let id = response.id.clone();
                let waiter = self.pending.get(&id).map(|w| w.value().clone());
                let Some(waiter) = waiter else {
                    self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
                    warn!(request_id = %id, "Response for unknown or expired request id");
                    return;
                };
                let event = TransportEvent::Message(InboundMessage::Response(response));
                if waiter.try_send(event).is_ok() {
                    self.stats.total_routed.fetch_add(1, Ordering::Relaxed);
                } else {
                    debug!(request_id = %id, "Waiter gone or full, dropping response");
                }
            }
            TransportEvent::Message(InboundMessage::EventReceived(_)) => {
                debug!("Ignoring event notification on shared call connection");
            }
            TransportEvent::Error(error) => self.fail_all(error),
        }
    }

    /// Deliver `error` to every waiter and clear the table.
    pub fn fail_all(&self, error: TransportError) {
        let ids: Vec<RequestId> = self.pending.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, waiter)) = self.pending.remove(&id) {
                let _ = waiter.try_send(TransportEvent::Error(error.clone()));
            }
        }
    }

    /// Drop every waiter; their receivers observe a closed channel.
    pub fn clear(&self) {
        self.pending.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}
