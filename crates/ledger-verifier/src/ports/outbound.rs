//! # Outbound Ports
//!
//! Traits for the Verifier's external dependencies: the message transport to
//! a Validator and the payload authenticator.

use crate::domain::{
    AuthError, InboundMessage, KeyMaterialRef, OutboundMessage, SocketOptions, TransportError,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::mpsc;

/// Something that arrives on an established connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A decoded message from the Validator.
    Message(InboundMessage),
    /// A channel-level error; the connection should be considered failed.
    Error(TransportError),
}

/// Sending half of an established connection.
///
/// All methods are synchronous: `emit` queues the message for the adapter's
/// writer and returns.
pub trait Connection: Send + Sync {
    /// Unique per connection for the lifetime of the process.
    fn serial(&self) -> u64;

    /// Queue a message for the Validator.
    fn emit(&self, message: OutboundMessage) -> Result<(), TransportError>;

    /// Close the connection. Idempotent. Ends the inbound stream.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// An established connection plus its inbound stream.
///
/// When `inbound` yields `None`, the connection is gone.
pub struct TransportChannel {
    pub connection: std::sync::Arc<dyn Connection>,
    pub inbound: mpsc::Receiver<TransportEvent>,
}

impl std::fmt::Debug for TransportChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportChannel")
            .field("serial", &self.connection.serial())
            .finish()
    }
}

/// Message transport to a Validator - outbound port.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection to `url`.
    ///
    /// Applies the TLS toggle, the connect timeout and, when enabled, the
    /// reconnection policy to the initial connect.
    async fn connect(
        &self,
        url: &str,
        options: &SocketOptions,
    ) -> Result<TransportChannel, TransportError>;
}

/// Claims decoded from an authenticated payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPayload(Value);

impl DecodedPayload {
    pub fn new(claims: Value) -> Self {
        Self(claims)
    }

    /// `result` claim of a synchronous-call response.
    pub fn result(&self) -> Value {
        self.0.get("result").cloned().unwrap_or(Value::Null)
    }

    /// `blockData` claim of an event notification.
    pub fn block_data(&self) -> Value {
        self.0.get("blockData").cloned().unwrap_or(Value::Null)
    }

    /// Optional `status` claim.
    pub fn status(&self) -> Option<&Value> {
        self.0.get("status")
    }

    pub fn claims(&self) -> &Value {
        &self.0
    }
}

/// Payload authenticator - outbound port.
///
/// Verifies a Validator-signed payload against the Validator's key material
/// and returns its decoded claims.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn verify(
        &self,
        key: &KeyMaterialRef,
        payload: &Value,
    ) -> Result<DecodedPayload, AuthError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Mock authenticator for testing.
///
/// Accepts any payload that is a JSON object, or a string holding one, and
/// returns it as the decoded claims. Payloads in `rejected` fail with
/// `BadSignature`.
#[derive(Default)]
pub struct MockAuthenticator {
    rejected: RwLock<Vec<Value>>,
    /// Reject everything.
    pub should_fail: bool,
}

impl MockAuthenticator {
    /// Authenticator that rejects every payload.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    /// Reject this exact payload from now on.
    pub fn reject(&self, payload: Value) {
        self.rejected.write().push(payload);
    }
}

#[async_trait]
impl Authenticator for MockAuthenticator {
    async fn verify(
        &self,
        _key: &KeyMaterialRef,
        payload: &Value,
    ) -> Result<DecodedPayload, AuthError> {
        if self.should_fail || self.rejected.read().contains(payload) {
            return Err(AuthError::BadSignature);
        }
        let claims = match payload {
            Value::String(s) => serde_json::from_str::<Value>(s)
                .map_err(|e| AuthError::Malformed(e.to_string()))?,
            other => other.clone(),
        };
        if !claims.is_object() {
            return Err(AuthError::Malformed("claims are not an object".into()));
        }
        Ok(DecodedPayload(claims))
    }
}
