//! Verifier Gateway - HTTP endpoints backed by a ledger Verifier.
//!
//! ```text
//!   GET /api/v1/htlc/get-status?ids=a,b
//!        │
//!        ▼
//!   get_status ──► ContractInvoker ──► VerifierInvoker ──► Verifier (request2)
//!        │
//!        ▼
//!   200 raw JSON result | 500 error message
//! ```

pub mod config;
pub mod invoker;
pub mod routes;

pub use config::{GatewayConfig, GatewayConfigError};
pub use invoker::{ContractInvocation, ContractInvoker, InvokeError, VerifierInvoker};
pub use routes::{router, GatewayState};
