//! Verifier counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for a `VerifierClient`
#[derive(Debug, Default)]
pub struct VerifierStats {
    /// Synchronous calls started
    pub calls_started: AtomicU64,
    /// Synchronous calls resolved with a Validator response
    pub calls_resolved: AtomicU64,
    /// Synchronous calls resolved with the soft-timeout sentinel
    pub soft_timeouts: AtomicU64,
    /// Calls and monitors failed by the transport
    pub transport_errors: AtomicU64,
    /// Payloads rejected by the authenticator
    pub auth_failures: AtomicU64,
    /// Events delivered to a listener
    pub events_dispatched: AtomicU64,
    /// Events dropped (no listener or failed authentication)
    pub events_dropped: AtomicU64,
    /// Monitors started
    pub monitors_started: AtomicU64,
    /// Monitors stopped through `stop_monitor`
    pub monitors_stopped: AtomicU64,
}

/// Point-in-time copy of [`VerifierStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub calls_started: u64,
    pub calls_resolved: u64,
    pub soft_timeouts: u64,
    pub transport_errors: u64,
    pub auth_failures: u64,
    pub events_dispatched: u64,
    pub events_dropped: u64,
    pub monitors_started: u64,
    pub monitors_stopped: u64,
}

impl VerifierStats {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            calls_started: self.calls_started.load(Ordering::Relaxed),
            calls_resolved: self.calls_resolved.load(Ordering::Relaxed),
            soft_timeouts: self.soft_timeouts.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            monitors_started: self.monitors_started.load(Ordering::Relaxed),
            monitors_stopped: self.monitors_stopped.load(Ordering::Relaxed),
        }
    }
}
