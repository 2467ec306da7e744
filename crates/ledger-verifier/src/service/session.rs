//! # Call Sessions
//!
//! One logical call to a Validator: open (or borrow) a connection, send the
//! envelope, and for synchronous calls wait for the response carrying the
//! same request id.
//!
//! | Outcome | Result |
//! |---------|--------|
//! | matching response | `Ok(resObj)`, or `Ok({status, data})` after authentication |
//! | deadline elapsed | `Ok({"status": 504, "amount": 0})` |
//! | connect/channel error | `Err(VerifierError::Transport)` |
//! | authentication failure | logged; waits for the deadline (`AwaitTimeout`) or `Err` (`Reject`) |
//!
//! Per-call connections are always closed once the outcome is known.

use crate::domain::{
    AuthFailurePolicy, CallResult, ConnectionPolicy, InboundMessage, LedgerCall, RequestId,
    ResponseEnvelope, SessionState, TransportError, VerifierError,
};
use crate::ports::{Connection, TransportChannel, TransportEvent};
use crate::service::client::ClientCore;
use crate::service::pending::PendingResponses;
use crate::service::stats::VerifierStats;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// How a wait for a correlated response ended.
enum Outcome {
    Resolved(CallResult),
    TimedOut,
    Failed(VerifierError),
}

/// State of one call, with logged transitions.
struct Session<'a> {
    id: &'a RequestId,
    state: SessionState,
}

impl<'a> Session<'a> {
    fn new(id: &'a RequestId) -> Self {
        Self {
            id,
            state: SessionState::Idle,
        }
    }

    fn advance(&mut self, next: SessionState) -> Result<(), VerifierError> {
        let from = self.state;
        self.state.transition(next)?;
        debug!(request_id = %self.id, from = %from, to = %next, "Session transition");
        Ok(())
    }
}

/// Fire-and-forget: connect, send, close.
pub(crate) async fn send_only(core: &ClientCore, call: LedgerCall) -> Result<(), VerifierError> {
    let id = core.ids.next_id();
    let mut session = Session::new(&id);
    debug!(request_id = %id, call = %call.label(), "Sending fire-and-forget request");

    session.advance(SessionState::Connecting)?;
    let channel = match core.connect().await {
        Ok(channel) => channel,
        Err(e) => return Err(fail_transport(core, &mut session, None, e)),
    };
    session.advance(SessionState::Connected)?;

    let message = call.into_message(Some(&id));
    let sent = channel.connection.emit(message);
    channel.connection.close();
    match sent {
        Ok(()) => {
            session.advance(SessionState::Closed)?;
            Ok(())
        }
        Err(e) => Err(fail_transport(core, &mut session, None, e)),
    }
}

/// Synchronous call under the configured connection policy.
pub(crate) async fn call(core: &ClientCore, call: LedgerCall) -> Result<CallResult, VerifierError> {
    VerifierStats::incr(&core.stats.calls_started);
    match core.config.connection_policy {
        ConnectionPolicy::PerCall => call_per_connection(core, call).await,
        ConnectionPolicy::Shared => call_shared(core, call).await,
    }
}

async fn call_per_connection(
    core: &ClientCore,
    call: LedgerCall,
) -> Result<CallResult, VerifierError> {
    let id = core.ids.next_id();
    let mut session = Session::new(&id);
    let secure = call.is_secure();
    debug!(request_id = %id, call = %call.label(), secure, "Executing synchronous call");

    session.advance(SessionState::Connecting)?;
    let TransportChannel {
        connection,
        mut inbound,
    } = match core.connect().await {
        Ok(channel) => channel,
        Err(e) => return Err(fail_transport(core, &mut session, None, e)),
    };
    session.advance(SessionState::Connected)?;

    if let Err(e) = connection.emit(call.into_message(Some(&id))) {
        return Err(fail_transport(core, &mut session, Some(&connection), e));
    }
    session.advance(SessionState::AwaitingResponse)?;

    let deadline = Instant::now() + core.config.sync_function_timeout;
    let outcome = await_response(core, &id, secure, &mut inbound, deadline).await;
    connection.close();
    finish(core, &mut session, outcome)
}

async fn call_shared(core: &ClientCore, call: LedgerCall) -> Result<CallResult, VerifierError> {
    let id = core.ids.next_id();
    let mut session = Session::new(&id);
    let secure = call.is_secure();
    debug!(request_id = %id, call = %call.label(), secure, "Executing synchronous call on shared connection");

    session.advance(SessionState::Connecting)?;
    let shared = match core.shared_channel().await {
        Ok(shared) => shared,
        Err(e) => return Err(fail_transport(core, &mut session, None, e)),
    };
    session.advance(SessionState::Connected)?;

    let mut inbound = shared.pending.register(id.clone());
    if let Err(e) = shared.connection.emit(call.into_message(Some(&id))) {
        shared.pending.remove(&id);
        shared.shut_down();
        return Err(fail_transport(core, &mut session, None, e));
    }
    session.advance(SessionState::AwaitingResponse)?;

    let deadline = Instant::now() + core.config.sync_function_timeout;
    let outcome = await_response(core, &id, secure, &mut inbound, deadline).await;
    shared.pending.remove(&id);
    finish(core, &mut session, outcome)
}

/// Wait for the response to `id` until `deadline`.
async fn await_response(
    core: &ClientCore,
    id: &RequestId,
    secure: bool,
    inbound: &mut mpsc::Receiver<TransportEvent>,
    deadline: Instant,
) -> Outcome {
    // Set once a matching response has been taken; later duplicates are ignored.
    let mut answered = false;

    loop {
        let event = match tokio::time::timeout_at(deadline, inbound.recv()).await {
            Err(_) => return Outcome::TimedOut,
            Ok(Some(event)) => event,
            Ok(None) => {
                debug!(request_id = %id, "Connection ended before a response, waiting for deadline");
                tokio::time::sleep_until(deadline).await;
                return Outcome::TimedOut;
            }
        };

        match event {
            TransportEvent::Message(InboundMessage::Response(response)) if response.id == *id => {
                if answered {
                    debug!(request_id = %id, "Ignoring duplicate response");
                    continue;
                }
                answered = true;
                debug!(request_id = %id, res_obj = %response.res_obj, "Received response");

                if !secure {
                    return Outcome::Resolved(CallResult::new(response.res_obj));
                }
                // The authenticator is bounded by the same deadline as the response.
                let verified =
                    match tokio::time::timeout_at(deadline, authenticate(core, &response)).await {
                        Ok(verified) => verified,
                        Err(_) => {
                            warn!(request_id = %id, "Authentication did not finish before deadline");
                            return Outcome::TimedOut;
                        }
                    };
                match verified {
                    Ok(result) => return Outcome::Resolved(result),
                    Err(e) => {
                        VerifierStats::incr(&core.stats.auth_failures);
                        error!(request_id = %id, error = %e, "Response failed authentication");
                        if core.config.auth_failure == AuthFailurePolicy::Reject {
                            return Outcome::Failed(e);
                        }
                    }
                }
            }
            TransportEvent::Message(InboundMessage::Response(response)) => {
                debug!(request_id = %id, other = %response.id, "Ignoring response for another request");
            }
            TransportEvent::Message(InboundMessage::EventReceived(_)) => {
                debug!(request_id = %id, "Ignoring event notification on call connection");
            }
            TransportEvent::Error(e) => {
                error!(request_id = %id, error = %e, "Transport error while awaiting response");
                return Outcome::Failed(e.into());
            }
        }
    }
}

/// Authenticate `resObj.data` and build `{status, data}`.
async fn authenticate(
    core: &ClientCore,
    response: &ResponseEnvelope,
) -> Result<CallResult, VerifierError> {
    let payload = response.data().cloned().unwrap_or_default();
    let decoded = core.authenticator.verify(&core.key, &payload).await?;
    Ok(CallResult::authenticated(response.status(), decoded.result()))
}

fn finish(
    core: &ClientCore,
    session: &mut Session<'_>,
    outcome: Outcome,
) -> Result<CallResult, VerifierError> {
    match outcome {
        Outcome::Resolved(result) => {
            session.advance(SessionState::Resolved)?;
            session.advance(SessionState::Closed)?;
            VerifierStats::incr(&core.stats.calls_resolved);
            Ok(result)
        }
        Outcome::TimedOut => {
            session.advance(SessionState::TimedOut)?;
            session.advance(SessionState::Closed)?;
            VerifierStats::incr(&core.stats.soft_timeouts);
            warn!(request_id = %session.id, "Request timed out");
            Ok(CallResult::timeout())
        }
        Outcome::Failed(e) => {
            if e.is_transport() {
                VerifierStats::incr(&core.stats.transport_errors);
                session.advance(SessionState::TransportError)?;
            } else {
                // Rejected authentication resolves the call, as an error.
                session.advance(SessionState::Resolved)?;
            }
            session.advance(SessionState::Closed)?;
            Err(e)
        }
    }
}

fn fail_transport(
    core: &ClientCore,
    session: &mut Session<'_>,
    connection: Option<&Arc<dyn Connection>>,
    error: TransportError,
) -> VerifierError {
    error!(request_id = %session.id, error = %error, "Transport failure");
    VerifierStats::incr(&core.stats.transport_errors);
    if let Some(connection) = connection {
        connection.close();
    }
    if session.state.can_transition_to(SessionState::TransportError) {
        session.state = SessionState::TransportError;
    }
    error.into()
}

/// One connection multiplexed across synchronous calls.
pub(crate) struct SharedChannel {
    pub(crate) connection: Arc<dyn Connection>,
    pub(crate) pending: Arc<PendingResponses>,
    alive: Arc<AtomicBool>,
}

impl SharedChannel {
    /// Start routing `channel`'s inbound stream by request id.
    pub(crate) fn spawn(channel: TransportChannel) -> Arc<Self> {
        let TransportChannel {
            connection,
            mut inbound,
        } = channel;
        let pending = Arc::new(PendingResponses::new());
        let alive = Arc::new(AtomicBool::new(true));

        let router_pending = Arc::clone(&pending);
        let router_alive = Arc::clone(&alive);
        let router_connection = Arc::clone(&connection);
        tokio::spawn(async move {
            while let Some(event) = inbound.recv().await {
                let failed = matches!(event, TransportEvent::Error(_));
                router_pending.route(event);
                if failed {
                    router_connection.close();
                    break;
                }
            }
            router_alive.store(false, Ordering::Release);
            router_pending.clear();
            debug!(serial = router_connection.serial(), "Shared connection router finished");
        });

        Arc::new(Self {
            connection,
            pending,
            alive,
        })
    }

    /// Whether the connection can take more calls.
    pub(crate) fn is_usable(&self) -> bool {
        self.alive.load(Ordering::Acquire) && !self.connection.is_closed()
    }

    pub(crate) fn shut_down(&self) {
        self.alive.store(false, Ordering::Release);
        self.connection.close();
    }
}
