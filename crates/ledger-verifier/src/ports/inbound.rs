//! # Inbound Ports
//!
//! The API business logic uses to talk to a Validator.

use crate::domain::{ApiInfo, CallResult, LedgerEvent, LedgerOperation, VerifierError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Receiver of ledger events.
///
/// Called from the monitor's pump task; implementations should hand the
/// event off rather than block.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: LedgerEvent);
}

/// Verifier API - inbound port.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Operations the Validator advertises.
    fn get_api_list(&self) -> Vec<ApiInfo>;

    /// Fire-and-forget `request`. Returns once the message is queued.
    async fn request_ledger_operation(&self, op: LedgerOperation) -> Result<(), VerifierError>;

    /// Fire-and-forget `request2`. Returns once the message is queued.
    async fn request_ledger_operation_neo(
        &self,
        contract: Value,
        method: Value,
        args: Value,
    ) -> Result<(), VerifierError>;

    /// Synchronous `request`; resolves with the raw `resObj` or the
    /// soft-timeout sentinel.
    async fn exec_sync_function(&self, op: LedgerOperation) -> Result<CallResult, VerifierError>;

    /// Synchronous `request2`; resolves with `{status, data}` from the
    /// authenticated response or the soft-timeout sentinel.
    async fn exec_sync_function_neo(
        &self,
        contract: Value,
        method: Value,
        args: Value,
    ) -> Result<CallResult, VerifierError>;

    /// Open and register a monitor connection. Resolves with a
    /// `LedgerEvent` whose `id` is the connection handle.
    async fn start_monitor(&self) -> Result<LedgerEvent, VerifierError>;

    /// Stop the monitor named by `handle`. Never fails; bad handles are logged.
    async fn stop_monitor(&self, handle: &str);

    /// Replace the event listener; `None` clears it.
    fn set_event_listener(&self, listener: Option<Arc<dyn EventListener>>);
}
