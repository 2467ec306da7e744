//! # Connection Registry
//!
//! Table of live monitor connections addressed by small integer handles.
//!
//! - `add` takes the lowest free slot, so handles stay small and a removed
//!   handle may be handed out again.
//! - Every entry remembers its connection serial. `remove_if` evicts only
//!   when the slot still holds that connection, so a delayed eviction never
//!   closes a newer connection that reused the handle.

use crate::domain::{ConnectionHandle, MonitorState, RegistryError};
use crate::ports::Connection;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A registered monitor connection.
#[derive(Clone)]
pub struct RegistryEntry {
    pub connection: Arc<dyn Connection>,
    pub state: Arc<Mutex<MonitorState>>,
    stop_requested: Arc<AtomicBool>,
}

impl RegistryEntry {
    pub fn new(connection: Arc<dyn Connection>, state: Arc<Mutex<MonitorState>>) -> Self {
        Self {
            connection,
            state,
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn serial(&self) -> u64 {
        self.connection.serial()
    }

    /// Record a stop request. Returns `false` if one was already recorded,
    /// whatever the transport state.
    pub fn request_stop(&self) -> bool {
        !self.stop_requested.swap(true, Ordering::AcqRel)
    }
}

/// Handle → connection table.
#[derive(Default)]
pub struct ConnectionRegistry {
    slots: Mutex<Vec<Option<RegistryEntry>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and return its handle.
    pub fn add(&self, entry: RegistryEntry) -> ConnectionHandle {
        let mut slots = self.slots.lock();
        let index = match slots.iter().position(Option::is_none) {
            Some(free) => {
                slots[free] = Some(entry);
                free
            }
            None => {
                slots.push(Some(entry));
                slots.len() - 1
            }
        };
        ConnectionHandle::new(index)
    }

    pub fn get(&self, handle: ConnectionHandle) -> Result<RegistryEntry, RegistryError> {
        self.slots
            .lock()
            .get(handle.index())
            .and_then(Option::as_ref)
            .cloned()
            .ok_or(RegistryError::NotFound(handle))
    }

    /// Evict and close. Missing handles are a no-op; returns whether an entry was removed.
    pub fn remove(&self, handle: ConnectionHandle) -> bool {
        let entry = self.take(handle, None);
        Self::close_entry(handle, entry)
    }

    /// Evict and close only if `handle` still names the connection with `serial`.
    pub fn remove_if(&self, handle: ConnectionHandle, serial: u64) -> bool {
        let entry = self.take(handle, Some(serial));
        Self::close_entry(handle, entry)
    }

    pub fn contains(&self, handle: ConnectionHandle) -> bool {
        self.get(handle).is_ok()
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handles of all registered connections, ascending.
    pub fn handles(&self) -> Vec<ConnectionHandle> {
        self.slots
            .lock()
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| ConnectionHandle::new(i))
            .collect()
    }

    /// Close and evict everything.
    pub fn close_all(&self) {
        let drained: Vec<_> = self.slots.lock().drain(..).flatten().collect();
        for entry in drained {
            entry.connection.close();
        }
    }

    fn take(&self, handle: ConnectionHandle, serial: Option<u64>) -> Option<RegistryEntry> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(handle.index())?;
        if let (Some(expected), Some(entry)) = (serial, slot.as_ref()) {
            if entry.serial() != expected {
                return None;
            }
        }
        let entry = slot.take();
        while matches!(slots.last(), Some(None)) {
            slots.pop();
        }
        entry
    }

    fn close_entry(handle: ConnectionHandle, entry: Option<RegistryEntry>) -> bool {
        match entry {
            Some(entry) => {
                entry.connection.close();
                debug!(handle = %handle, serial = entry.serial(), "Removed connection from registry");
                true
            }
            None => {
                debug!(handle = %handle, "No connection to remove");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OutboundMessage, TransportError};

    struct FakeConnection {
        serial: u64,
        closed: AtomicBool,
    }

    impl Connection for FakeConnection {
        fn serial(&self) -> u64 {
            self.serial
        }
        fn emit(&self, _message: OutboundMessage) -> Result<(), TransportError> {
            Ok(())
        }
        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    fn entry(serial: u64) -> (RegistryEntry, Arc<FakeConnection>) {
        let connection = Arc::new(FakeConnection {
            serial,
            closed: AtomicBool::new(false),
        });
        let entry = RegistryEntry::new(
            connection.clone(),
            Arc::new(Mutex::new(MonitorState::Subscribed)),
        );
        (entry, connection)
    }

    #[test]
    fn test_add_returns_sequential_handles() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.add(entry(1).0), ConnectionHandle::new(0));
        assert_eq!(registry.add(entry(2).0), ConnectionHandle::new(1));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_closes_and_evicts() {
        let registry = ConnectionRegistry::new();
        let (e, conn) = entry(1);
        let handle = registry.add(e);

        assert!(registry.remove(handle));
        assert!(conn.is_closed());
        assert_eq!(registry.get(handle).err(), Some(RegistryError::NotFound(handle)));
        // Second removal is a no-op.
        assert!(!registry.remove(handle));
    }

    #[test]
    fn test_freed_slot_is_reused() {
        let registry = ConnectionRegistry::new();
        let first = registry.add(entry(1).0);
        let second = registry.add(entry(2).0);
        registry.remove(first);

        assert_eq!(registry.add(entry(3).0), first);
        assert_eq!(registry.handles(), vec![first, second]);
    }

    #[test]
    fn test_remove_if_spares_reused_handle() {
        let registry = ConnectionRegistry::new();
        let handle = registry.add(entry(10).0);
        registry.remove(handle);

        let (newer, newer_conn) = entry(11);
        assert_eq!(registry.add(newer), handle);

        assert!(!registry.remove_if(handle, 10));
        assert!(!newer_conn.is_closed());
        assert!(registry.contains(handle));

        assert!(registry.remove_if(handle, 11));
        assert!(newer_conn.is_closed());
    }

    #[test]
    fn test_close_all() {
        let registry = ConnectionRegistry::new();
        let (a, conn_a) = entry(1);
        let (b, conn_b) = entry(2);
        registry.add(a);
        registry.add(b);

        registry.close_all();
        assert!(registry.is_empty());
        assert!(conn_a.is_closed() && conn_b.is_closed());
    }

    #[test]
    fn test_out_of_range_handle() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.contains(ConnectionHandle::new(42)));
        assert!(!registry.remove(ConnectionHandle::new(42)));
    }

    #[test]
    fn test_stop_request_recorded_once_per_registration() {
        let registry = ConnectionRegistry::new();
        let (entry, _) = entry(1);
        let handle = registry.add(entry);

        let stored = registry.get(handle).unwrap();
        *stored.state.lock() = MonitorState::Disconnected;
        assert!(stored.request_stop());
        assert!(!registry.get(handle).unwrap().request_stop());
    }
}
