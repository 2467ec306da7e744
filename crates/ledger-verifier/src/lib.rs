//! Ledger Verifier - client-side mediator between business logic and ledger Validators.
//!
//! A Validator is a ledger-specific adapter process reached over a
//! connection-oriented message channel that has no request semantics of its
//! own. This crate correlates requests with responses by request id, bounds
//! every synchronous call with a soft timeout, manages monitor connections
//! through a handle registry and authenticates Validator-signed payloads.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     Business logic (Verifier port)               │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────┴──────────────────────────────────┐
//! │                         VerifierClient                           │
//! │  ┌────────────────┐  ┌─────────────────┐  ┌──────────────────┐   │
//! │  │  Call session  │  │ Monitor session │  │ EventDispatcher  │   │
//! │  │ (id + timeout) │  │  (pump task)    │  │  (single slot)   │   │
//! │  └───────┬────────┘  └───────┬─────────┘  └────────▲─────────┘   │
//! │          │      ┌────────────┴───────┐             │             │
//! │          │      │ ConnectionRegistry │     authenticated events  │
//! │          │      └────────────────────┘             │             │
//! └──────────┼─────────────────────────────────────────┼─────────────┘
//!            ▼                                         │
//!      Transport port ──► WebSocket / in-memory   Authenticator port ──► ES256 JWS
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use ledger_verifier::{LedgerOperation, Verifier, VerifierClient, VerifierConfig};
//!
//! let client = VerifierClient::websocket(descriptor, VerifierConfig::default())?;
//! let result = client.exec_sync_function(LedgerOperation::new("getNumericBalance")).await?;
//! if result.is_soft_timeout() {
//!     // no response within sync_function_timeout
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{
    ChannelListener, InMemoryTransport, JwsAuthenticator, ValidatorEndpoint, WebSocketTransport,
};
pub use domain::{
    ApiInfo, AuthError, AuthFailurePolicy, CallResult, ConfigError, ConnectionHandle,
    ConnectionPolicy, DescriptorError, HandleError, KeyMaterialRef, LedgerCall, LedgerEvent,
    LedgerOperation, MonitorState, ReconnectPolicy, RequestId, RequestIdGenerator, RequestedData,
    SessionState, SocketOptions, TransportError, ValidatorDescriptor, VerifierConfig,
    VerifierError,
};
pub use ports::{
    Authenticator, Connection, DecodedPayload, EventListener, MockAuthenticator, Transport,
    TransportChannel, TransportEvent, Verifier,
};
pub use service::{ConnectionRegistry, StatsSnapshot, VerifierClient};
