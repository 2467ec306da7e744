//! # Monitor Sessions
//!
//! `start` opens a connection, registers it, sends `startMonitor` and spawns
//! one pump task per connection. The pump authenticates each
//! `eventReceived` and dispatches it, so events on one monitor reach the
//! listener in arrival order.
//!
//! `stop` sends `stopMonitor` and evicts the registry entry after the grace
//! delay. Events arriving inside the grace window are still dispatched.

use crate::domain::{
    ConnectionHandle, EventNotification, InboundMessage, LedgerEvent, MonitorState,
    OutboundMessage, VerifierError,
};
use crate::ports::{Connection, TransportChannel, TransportEvent};
use crate::service::client::ClientCore;
use crate::service::registry::RegistryEntry;
use crate::service::stats::VerifierStats;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

fn advance(state: &Mutex<MonitorState>, next: MonitorState) -> Result<(), VerifierError> {
    state.lock().transition(next).map_err(VerifierError::from)
}

/// Apply `next` if legal from the current state; otherwise leave the state alone.
fn advance_if_legal(state: &Mutex<MonitorState>, next: MonitorState) {
    let mut current = state.lock();
    if current.can_transition_to(next) {
        *current = next;
    }
}

pub(crate) async fn start(core: &Arc<ClientCore>) -> Result<LedgerEvent, VerifierError> {
    let state = Arc::new(Mutex::new(MonitorState::Idle));
    advance(&state, MonitorState::Connecting)?;
    debug!(validator_url = %core.descriptor.validator_url, "Starting monitor");

    let TransportChannel {
        connection,
        inbound,
    } = match core.connect().await {
        Ok(channel) => channel,
        Err(e) => {
            advance(&state, MonitorState::TransportError)?;
            VerifierStats::incr(&core.stats.transport_errors);
            error!(validator_id = %core.descriptor.validator_id, error = %e, "Monitor connect failed");
            return Err(e.into());
        }
    };
    advance(&state, MonitorState::Connected)?;

    let handle = core
        .registry
        .add(RegistryEntry::new(Arc::clone(&connection), Arc::clone(&state)));

    if let Err(e) = connection.emit(OutboundMessage::StartMonitor) {
        advance_if_legal(&state, MonitorState::TransportError);
        core.registry.remove_if(handle, connection.serial());
        VerifierStats::incr(&core.stats.transport_errors);
        error!(handle = %handle, error = %e, "Failed to send startMonitor");
        return Err(e.into());
    }
    advance(&state, MonitorState::Subscribed)?;
    VerifierStats::incr(&core.stats.monitors_started);

    tokio::spawn(pump(Arc::clone(core), handle, connection, state, inbound));

    info!(
        handle = %handle,
        validator_id = %core.descriptor.validator_id,
        "Monitor started"
    );
    Ok(LedgerEvent::monitor_started(handle, &core.descriptor.validator_id))
}

async fn pump(
    core: Arc<ClientCore>,
    handle: ConnectionHandle,
    connection: Arc<dyn Connection>,
    state: Arc<Mutex<MonitorState>>,
    mut inbound: mpsc::Receiver<TransportEvent>,
) {
    while let Some(event) = inbound.recv().await {
        match event {
            TransportEvent::Message(InboundMessage::EventReceived(notification)) => {
                on_notification(&core, handle, &state, notification).await;
            }
            TransportEvent::Message(InboundMessage::Response(response)) => {
                debug!(handle = %handle, request_id = %response.id, "Ignoring response on monitor connection");
            }
            TransportEvent::Error(e) => {
                // The entry stays registered until stop_monitor removes it.
                error!(handle = %handle, error = %e, "Monitor connection failed");
                VerifierStats::incr(&core.stats.transport_errors);
                advance_if_legal(&state, MonitorState::TransportError);
                connection.close();
                break;
            }
        }
    }
    advance_if_legal(&state, MonitorState::Disconnected);
    debug!(handle = %handle, serial = connection.serial(), "Monitor pump finished");
}

async fn on_notification(
    core: &ClientCore,
    handle: ConnectionHandle,
    state: &Mutex<MonitorState>,
    notification: EventNotification,
) {
    if !core.dispatcher.has_listener() {
        warn!(handle = %handle, "No event listener registered, skipping event");
        VerifierStats::incr(&core.stats.events_dropped);
        return;
    }

    let decoded = match core
        .authenticator
        .verify(&core.key, &notification.block_data)
        .await
    {
        Ok(decoded) => decoded,
        Err(e) => {
            error!(handle = %handle, error = %e, "Event failed authentication, dropping");
            VerifierStats::incr(&core.stats.auth_failures);
            VerifierStats::incr(&core.stats.events_dropped);
            return;
        }
    };

    {
        let mut current = state.lock();
        if *current == MonitorState::Subscribed {
            *current = MonitorState::ReceivingEvents;
        }
    }

    let event = LedgerEvent::block(
        core.descriptor.validator_id.clone(),
        notification.status,
        decoded.block_data(),
    );
    if core.dispatcher.dispatch(event) {
        VerifierStats::incr(&core.stats.events_dispatched);
    } else {
        VerifierStats::incr(&core.stats.events_dropped);
    }
}

pub(crate) async fn stop(core: &ClientCore, handle: &str) {
    let parsed = match ConnectionHandle::parse(handle) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(handle, error = %e, "Ignoring stopMonitor for invalid handle");
            return;
        }
    };

    let entry = match core.registry.get(parsed) {
        Ok(entry) => entry,
        Err(e) => {
            warn!(handle = %parsed, error = %e, "Ignoring stopMonitor");
            return;
        }
    };

    // Tracked apart from the state machine, which may already sit in
    // TransportError or Disconnected after the pump exited.
    if !entry.request_stop() {
        debug!(handle = %parsed, "Stop already requested");
        return;
    }
    advance_if_legal(&entry.state, MonitorState::StopRequested);

    if let Err(e) = entry.connection.emit(OutboundMessage::StopMonitor) {
        warn!(handle = %parsed, error = %e, "Failed to send stopMonitor");
    }
    VerifierStats::incr(&core.stats.monitors_stopped);
    debug!(handle = %parsed, grace_ms = core.config.monitor_stop_grace.as_millis() as u64, "Stop requested");

    let registry = Arc::clone(&core.registry);
    let grace = core.config.monitor_stop_grace;
    let serial = entry.serial();
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        if registry.remove_if(parsed, serial) {
            info!(handle = %parsed, "Monitor stopped");
        }
    });
}
