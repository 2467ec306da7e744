//! HTTP routes.

pub mod get_status;

use crate::config::GatewayConfig;
use crate::invoker::ContractInvoker;
use axum::{routing::get, Router};
use std::sync::Arc;

/// State shared across handlers
#[derive(Clone)]
pub struct GatewayState {
    pub invoker: Arc<dyn ContractInvoker>,
    pub config: Arc<GatewayConfig>,
}

impl GatewayState {
    pub fn new(invoker: Arc<dyn ContractInvoker>, config: GatewayConfig) -> Self {
        Self {
            invoker,
            config: Arc::new(config),
        }
    }
}

/// Build the gateway router.
pub fn router(state: GatewayState) -> Router {
    let route = state.config.route.clone();
    Router::new()
        .route(&route, get(get_status::get_status))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}
