//! # Verifier Client
//!
//! Public entry point. Holds the Validator descriptor, the configuration and
//! the two outbound ports, and owns the connection registry, the request id
//! generator and the event listener slot.

use crate::adapters::{JwsAuthenticator, WebSocketTransport};
use crate::domain::{
    ApiInfo, CallResult, KeyMaterialRef, LedgerCall, LedgerEvent, LedgerOperation,
    RequestIdGenerator, TransportError, ValidatorDescriptor, VerifierConfig, VerifierError,
};
use crate::ports::{Authenticator, EventListener, Transport, TransportChannel, Verifier};
use crate::service::dispatcher::EventDispatcher;
use crate::service::registry::ConnectionRegistry;
use crate::service::session::SharedChannel;
use crate::service::stats::{StatsSnapshot, VerifierStats};
use crate::service::{monitor, session};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// State shared between the client, its sessions and its monitor pumps.
pub(crate) struct ClientCore {
    pub(crate) descriptor: ValidatorDescriptor,
    pub(crate) key: KeyMaterialRef,
    pub(crate) config: VerifierConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) authenticator: Arc<dyn Authenticator>,
    pub(crate) ids: RequestIdGenerator,
    pub(crate) registry: Arc<ConnectionRegistry>,
    pub(crate) dispatcher: EventDispatcher,
    pub(crate) stats: VerifierStats,
    shared: tokio::sync::Mutex<Option<Arc<SharedChannel>>>,
}

impl ClientCore {
    /// Open a new connection to the Validator.
    pub(crate) async fn connect(&self) -> Result<TransportChannel, TransportError> {
        self.transport
            .connect(&self.descriptor.validator_url, &self.config.socket_options)
            .await
    }

    /// The shared call connection, reconnecting if the previous one died.
    pub(crate) async fn shared_channel(&self) -> Result<Arc<SharedChannel>, TransportError> {
        let mut slot = self.shared.lock().await;
        if let Some(shared) = slot.as_ref() {
            if shared.is_usable() {
                return Ok(Arc::clone(shared));
            }
            debug!("Shared connection lost, reconnecting");
        }
        let shared = SharedChannel::spawn(self.connect().await?);
        *slot = Some(Arc::clone(&shared));
        Ok(shared)
    }
}

/// Verifier client for one Validator.
pub struct VerifierClient {
    core: Arc<ClientCore>,
}

impl VerifierClient {
    /// Build a client. Fails if the descriptor or configuration is invalid.
    pub fn new(
        descriptor: ValidatorDescriptor,
        config: VerifierConfig,
        transport: Arc<dyn Transport>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self, VerifierError> {
        descriptor.validate()?;
        config.validate()?;

        info!(
            validator_id = %descriptor.validator_id,
            validator_url = %descriptor.validator_url,
            connection_policy = ?config.connection_policy,
            "Creating verifier client"
        );

        let core = ClientCore {
            key: descriptor.key_ref(),
            ids: RequestIdGenerator::new(
                descriptor.validator_id.clone(),
                config.max_counter_request_id,
            ),
            descriptor,
            config,
            transport,
            authenticator,
            registry: Arc::new(ConnectionRegistry::new()),
            dispatcher: EventDispatcher::new(),
            stats: VerifierStats::default(),
            shared: tokio::sync::Mutex::new(None),
        };
        Ok(Self {
            core: Arc::new(core),
        })
    }

    /// Build a client from descriptor JSON.
    pub fn from_json(
        descriptor_json: &str,
        config: VerifierConfig,
        transport: Arc<dyn Transport>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self, VerifierError> {
        let descriptor = ValidatorDescriptor::from_json(descriptor_json)?;
        Self::new(descriptor, config, transport, authenticator)
    }

    /// Client talking WebSocket and verifying ES256 JWS payloads.
    pub fn websocket(
        descriptor: ValidatorDescriptor,
        config: VerifierConfig,
    ) -> Result<Self, VerifierError> {
        Self::new(
            descriptor,
            config,
            Arc::new(WebSocketTransport::new()),
            Arc::new(JwsAuthenticator::new()),
        )
    }

    pub fn descriptor(&self) -> &ValidatorDescriptor {
        &self.core.descriptor
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.core.config
    }

    /// Registered monitor connections.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.core.registry
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.core.stats.snapshot()
    }

    /// Close every monitor connection and the shared call connection.
    pub async fn shutdown(&self) {
        self.core.registry.close_all();
        if let Some(shared) = self.core.shared.lock().await.take() {
            shared.shut_down();
        }
        debug!(validator_id = %self.core.descriptor.validator_id, "Verifier client shut down");
    }
}

impl Drop for VerifierClient {
    fn drop(&mut self) {
        // Monitor pumps hold the core; closing their connections ends them.
        self.core.registry.close_all();
        if let Ok(mut slot) = self.core.shared.try_lock() {
            if let Some(shared) = slot.take() {
                shared.shut_down();
            }
        }
    }
}

#[async_trait]
impl Verifier for VerifierClient {
    fn get_api_list(&self) -> Vec<ApiInfo> {
        debug!("call : get_api_list");
        self.core.descriptor.api_info.clone()
    }

    async fn request_ledger_operation(&self, op: LedgerOperation) -> Result<(), VerifierError> {
        session::send_only(&self.core, LedgerCall::from(op)).await
    }

    async fn request_ledger_operation_neo(
        &self,
        contract: Value,
        method: Value,
        args: Value,
    ) -> Result<(), VerifierError> {
        let call = LedgerCall::Structured {
            contract,
            method,
            args,
        };
        session::send_only(&self.core, call).await
    }

    async fn exec_sync_function(&self, op: LedgerOperation) -> Result<CallResult, VerifierError> {
        session::call(&self.core, LedgerCall::from(op)).await
    }

    async fn exec_sync_function_neo(
        &self,
        contract: Value,
        method: Value,
        args: Value,
    ) -> Result<CallResult, VerifierError> {
        let call = LedgerCall::Structured {
            contract,
            method,
            args,
        };
        session::call(&self.core, call).await
    }

    async fn start_monitor(&self) -> Result<LedgerEvent, VerifierError> {
        monitor::start(&self.core).await
    }

    async fn stop_monitor(&self, handle: &str) {
        monitor::stop(&self.core, handle).await
    }

    fn set_event_listener(&self, listener: Option<Arc<dyn EventListener>>) {
        debug!(set = listener.is_some(), "call : set_event_listener");
        self.core.dispatcher.set_listener(listener);
    }
}
