//! `EventListener` that forwards events onto a tokio channel.

use crate::domain::LedgerEvent;
use crate::ports::EventListener;
use tokio::sync::mpsc;
use tracing::warn;

/// Forwards every event into an unbounded channel.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<LedgerEvent>,
}

impl ChannelListener {
    /// Create a listener and the receiver it feeds.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LedgerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventListener for ChannelListener {
    fn on_event(&self, event: LedgerEvent) {
        if self.tx.send(event).is_err() {
            warn!("Event receiver dropped, discarding event");
        }
    }
}
