//! # Contract Invoker
//!
//! Port between HTTP handlers and whatever executes contract calls, plus
//! the adapter that runs them through a [`Verifier`] as secure `request2`
//! calls.

use async_trait::async_trait;
use ledger_verifier::{Verifier, VerifierError};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// One contract call.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractInvocation {
    pub contract: Value,
    pub method: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error(transparent)]
    Verifier(#[from] VerifierError),

    #[error("validator did not respond within {0:?}")]
    TimedOut(std::time::Duration),

    #[error("{0}")]
    Other(String),
}

/// Executes contract calls.
#[async_trait]
pub trait ContractInvoker: Send + Sync {
    async fn invoke_contract(&self, invocation: ContractInvocation) -> Result<Value, InvokeError>;
}

/// [`ContractInvoker`] backed by a [`Verifier`].
pub struct VerifierInvoker {
    verifier: Arc<dyn Verifier>,
    timeout: std::time::Duration,
}

impl VerifierInvoker {
    /// `timeout` is only used to describe soft timeouts in errors.
    pub fn new(verifier: Arc<dyn Verifier>, timeout: std::time::Duration) -> Self {
        Self { verifier, timeout }
    }
}

#[async_trait]
impl ContractInvoker for VerifierInvoker {
    async fn invoke_contract(&self, invocation: ContractInvocation) -> Result<Value, InvokeError> {
        debug!(
            method = %invocation.method,
            params = invocation.params.len(),
            "Invoking contract"
        );

        let result = self
            .verifier
            .exec_sync_function_neo(
                invocation.contract,
                Value::String(invocation.method),
                Value::Array(invocation.params),
            )
            .await?;

        if result.is_soft_timeout() {
            return Err(InvokeError::TimedOut(self.timeout));
        }
        Ok(result.into_value())
    }
}
