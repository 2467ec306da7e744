//! Verifier configuration with validation.
//!
//! Read once at `VerifierClient` construction; there is no hot reload.
//! Durations use humantime notation (`"5s"`, `"250ms"`) when deserialized.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main Verifier configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Deadline for a synchronous call's correlated response.
    #[serde(with = "humantime_serde")]
    pub sync_function_timeout: Duration,
    /// Request counter ceiling; the counter wraps to 1 past this value.
    pub max_counter_request_id: u64,
    /// Delay between sending `stopMonitor` and closing the monitor connection.
    #[serde(with = "humantime_serde")]
    pub monitor_stop_grace: Duration,
    /// Transport options applied to every connection.
    pub socket_options: SocketOptions,
    /// Connection reuse policy for synchronous calls.
    pub connection_policy: ConnectionPolicy,
    /// What a synchronous secure call does when its response fails authentication.
    pub auth_failure: AuthFailurePolicy,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            sync_function_timeout: Duration::from_millis(5000),
            max_counter_request_id: 100,
            monitor_stop_grace: Duration::from_millis(3000),
            socket_options: SocketOptions::default(),
            connection_policy: ConnectionPolicy::default(),
            auth_failure: AuthFailurePolicy::default(),
        }
    }
}

impl VerifierConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync_function_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "sync_function_timeout cannot be 0".into(),
            ));
        }

        if self.max_counter_request_id == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_counter_request_id cannot be 0".into(),
            ));
        }

        self.socket_options.validate()
    }
}

/// Transport options for a Validator connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketOptions {
    /// Reject TLS certificates that fail verification.
    ///
    /// Validators commonly run with self-signed certificates, hence the
    /// permissive default.
    pub reject_unauthorized: bool,
    /// Reconnection policy for the initial connect.
    pub reconnection: ReconnectPolicy,
    /// Per-attempt connect timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            reject_unauthorized: false,
            reconnection: ReconnectPolicy::default(),
            timeout: Duration::from_secs(20),
        }
    }
}

impl SocketOptions {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "socket_options.timeout cannot be 0".into(),
            ));
        }
        if self.reconnection.enabled && self.reconnection.max_attempts == 0 {
            return Err(ConfigError::InvalidLimit(
                "reconnection.max_attempts cannot be 0 when reconnection is enabled".into(),
            ));
        }
        if self.reconnection.base_delay > self.reconnection.max_delay {
            return Err(ConfigError::Invalid(
                "reconnection.base_delay exceeds reconnection.max_delay".into(),
            ));
        }
        Ok(())
    }
}

/// Exponential-backoff retry of the initial transport connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Retry failed connects at all.
    pub enabled: bool,
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt.
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Upper bound on the delay between attempts.
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 10,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl ReconnectPolicy {
    /// Number of connect attempts this policy allows.
    pub fn attempts(&self) -> u32 {
        if self.enabled {
            self.max_attempts.max(1)
        } else {
            1
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Connection reuse for synchronous calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPolicy {
    /// Open a fresh connection per call, isolating failures per call.
    #[default]
    PerCall,
    /// Multiplex calls over one long-lived connection, correlated by request id.
    Shared,
}

/// Outcome of a secure synchronous call whose response fails authentication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailurePolicy {
    /// Log the failure and keep waiting; the soft timeout resolves the call.
    #[default]
    AwaitTimeout,
    /// Fail the call with `VerifierError::Authentication`.
    Reject,
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
