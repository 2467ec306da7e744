//! # Domain Errors
//!
//! Error taxonomy for the Verifier client.
//!
//! | Class | Surfaced as |
//! |-------|-------------|
//! | Transport failure | `Err(VerifierError::Transport)`, connection closed |
//! | Soft timeout | `Ok(CallResult)` carrying status 504 (not an error) |
//! | Authentication failure | logged and dropped (or rejected under `AuthFailurePolicy::Reject`) |
//! | Invalid handle | logged, `stop_monitor` returns normally |

use crate::domain::config::ConfigError;
use crate::domain::descriptor::DescriptorError;
use crate::domain::handle::ConnectionHandle;
use crate::domain::state::InvalidTransition;
use std::time::Duration;
use thiserror::Error;

/// Transport-level failures: connect errors, connect timeouts and channel errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The Validator could not be reached.
    #[error("connect to {url} failed: {reason}")]
    ConnectFailed {
        /// Validator address.
        url: String,
        /// Underlying reason.
        reason: String,
    },

    /// Connect did not complete within the configured timeout.
    #[error("connect to {url} timed out after {timeout:?}")]
    ConnectTimeout {
        /// Validator address.
        url: String,
        /// Configured connect timeout.
        timeout: Duration,
    },

    /// Generic channel error reported by an established connection.
    #[error("channel error: {0}")]
    Channel(String),

    /// An outbound message could not be encoded.
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// The connection was already closed.
    #[error("connection closed")]
    Closed,
}

/// Failures of the payload authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Key material could not be loaded.
    #[error("key material unavailable at {key}: {reason}")]
    KeyUnavailable {
        /// Key reference.
        key: String,
        /// Underlying reason.
        reason: String,
    },

    /// Payload is not a well-formed signed token.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Token header names an algorithm other than the supported one.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Signature does not verify against the key material.
    #[error("signature verification failed")]
    BadSignature,

    /// Token carries an `exp` claim in the past.
    #[error("payload expired at {exp}")]
    Expired {
        /// Expiry (seconds since Unix epoch).
        exp: u64,
    },
}

/// A `stop_monitor` handle string that does not name a usable handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    /// Not an integer.
    #[error("handle is not an integer: {0:?}")]
    Unparseable(String),

    /// Parsed, but negative.
    #[error("handle is negative: {0}")]
    Negative(i64),
}

/// Registry lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No connection registered under the handle.
    #[error("no connection registered under handle {0}")]
    NotFound(ConnectionHandle),
}

/// Top-level error returned by Verifier operations.
#[derive(Debug, Error)]
pub enum VerifierError {
    /// Descriptor JSON could not be parsed.
    #[error("invalid validator descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    /// Configuration rejected by validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Transport failure during connect, send or while awaiting a response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Authentication failure (only surfaced under `AuthFailurePolicy::Reject`).
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),

    /// Session state machine violation.
    #[error(transparent)]
    State(#[from] InvalidTransition),
}

impl VerifierError {
    /// Whether this error originated in the transport layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, VerifierError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::ConnectTimeout {
            url: "ws://127.0.0.1:5040".to_string(),
            timeout: Duration::from_secs(20),
        };
        assert_eq!(
            err.to_string(),
            "connect to ws://127.0.0.1:5040 timed out after 20s"
        );
    }

    #[test]
    fn test_verifier_error_from_transport() {
        let err: VerifierError = TransportError::Closed.into();
        assert!(err.is_transport());
        assert_eq!(err.to_string(), "connection closed");
    }

    #[test]
    fn test_handle_error_display() {
        assert_eq!(HandleError::Negative(-1).to_string(), "handle is negative: -1");
    }
}
