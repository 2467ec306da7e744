//! # Session State Machines
//!
//! Synchronous call:
//!
//! ```text
//! Idle ──► Connecting ──► Connected ──► AwaitingResponse ──┬──► Resolved ───────┐
//!              │              │               │             ├──► TimedOut ───────┤
//!              └──────────────┴───────────────┴─────────────┴──► TransportError ─┴──► Closed
//! ```
//!
//! Monitor:
//!
//! ```text
//! Idle ──► Connecting ──► Connected ──► Subscribed ──► ReceivingEvents ──► StopRequested ──► Disconnected
//!              │                            │                │
//!              └──► TransportError          └────────────────┴──► TransportError ──► Disconnected
//! ```
//!
//! Transitions are validated; an illegal one is an `InvalidTransition`.

use std::fmt;
use thiserror::Error;

/// A rejected state transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {machine} transition: {from} -> {to}")]
pub struct InvalidTransition {
    /// Which machine rejected the transition.
    pub machine: &'static str,
    /// State before.
    pub from: String,
    /// Requested state.
    pub to: String,
}

/// States of a synchronous call or fire-and-forget session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Connected,
    AwaitingResponse,
    Resolved,
    TimedOut,
    TransportError,
    Closed,
}

impl SessionState {
    /// Whether the call outcome has been decided.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Resolved | SessionState::TimedOut | SessionState::TransportError
        )
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, Connecting) => true,
            (Connecting, Connected) | (Connecting, TransportError) => true,
            // Fire-and-forget sessions close straight after the send.
            (Connected, AwaitingResponse) | (Connected, TransportError) | (Connected, Closed) => {
                true
            }
            (AwaitingResponse, Resolved)
            | (AwaitingResponse, TimedOut)
            | (AwaitingResponse, TransportError) => true,
            (s, Closed) if s.is_terminal() => true,
            _ => false,
        }
    }

    /// Apply a transition, rejecting illegal ones.
    pub fn transition(&mut self, next: SessionState) -> Result<(), InvalidTransition> {
        if !self.can_transition_to(next) {
            return Err(InvalidTransition {
                machine: "session",
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::AwaitingResponse => "awaiting_response",
            SessionState::Resolved => "resolved",
            SessionState::TimedOut => "timed_out",
            SessionState::TransportError => "transport_error",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// States of a monitor session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Connecting,
    Connected,
    Subscribed,
    ReceivingEvents,
    StopRequested,
    TransportError,
    Disconnected,
}

impl MonitorState {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: MonitorState) -> bool {
        use MonitorState::*;
        match (self, next) {
            (Idle, Connecting) => true,
            (Connecting, Connected) | (Connecting, TransportError) => true,
            (Connected, Subscribed) | (Connected, TransportError) => true,
            (Subscribed, ReceivingEvents) | (ReceivingEvents, ReceivingEvents) => true,
            (Subscribed, StopRequested) | (ReceivingEvents, StopRequested) => true,
            (Subscribed, TransportError) | (ReceivingEvents, TransportError) => true,
            // Events arriving inside the stop grace window are still dispatched.
            (StopRequested, StopRequested) => true,
            (StopRequested, TransportError) => true,
            (StopRequested, Disconnected) | (TransportError, Disconnected) => true,
            (Subscribed, Disconnected) | (ReceivingEvents, Disconnected) => true,
            _ => false,
        }
    }

    /// Apply a transition, rejecting illegal ones.
    pub fn transition(&mut self, next: MonitorState) -> Result<(), InvalidTransition> {
        if !self.can_transition_to(next) {
            return Err(InvalidTransition {
                machine: "monitor",
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }

    /// Whether inbound events are still dispatched in this state.
    pub fn accepts_events(&self) -> bool {
        matches!(
            self,
            MonitorState::Subscribed | MonitorState::ReceivingEvents | MonitorState::StopRequested
        )
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MonitorState::Idle => "idle",
            MonitorState::Connecting => "connecting",
            MonitorState::Connected => "connected",
            MonitorState::Subscribed => "subscribed",
            MonitorState::ReceivingEvents => "receiving_events",
            MonitorState::StopRequested => "stop_requested",
            MonitorState::TransportError => "transport_error",
            MonitorState::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_happy_path() {
        let mut state = SessionState::Idle;
        for next in [
            SessionState::Connecting,
            SessionState::Connected,
            SessionState::AwaitingResponse,
            SessionState::Resolved,
            SessionState::Closed,
        ] {
            state.transition(next).unwrap();
        }
        assert_eq!(state, SessionState::Closed);
    }

    #[test]
    fn test_session_rejects_skipping_connect() {
        let mut state = SessionState::Idle;
        let err = state.transition(SessionState::AwaitingResponse).unwrap_err();
        assert_eq!(err.to_string(), "invalid session transition: idle -> awaiting_response");
        assert_eq!(state, SessionState::Idle);
    }

    #[test]
    fn test_session_terminal_states_close() {
        for terminal in [
            SessionState::Resolved,
            SessionState::TimedOut,
            SessionState::TransportError,
        ] {
            assert!(terminal.can_transition_to(SessionState::Closed));
            assert!(!terminal.can_transition_to(SessionState::AwaitingResponse));
        }
    }

    #[test]
    fn test_monitor_lifecycle() {
        let mut state = MonitorState::Idle;
        for next in [
            MonitorState::Connecting,
            MonitorState::Connected,
            MonitorState::Subscribed,
            MonitorState::ReceivingEvents,
            MonitorState::ReceivingEvents,
            MonitorState::StopRequested,
            MonitorState::Disconnected,
        ] {
            state.transition(next).unwrap();
        }
        assert!(!state.accepts_events());
    }

    #[test]
    fn test_monitor_cannot_restart_after_disconnect() {
        let mut state = MonitorState::Disconnected;
        assert!(state.transition(MonitorState::Subscribed).is_err());
    }
}
