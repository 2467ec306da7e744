//! # Verifier Gateway
//!
//! Serves the HTLC status route on top of a WebSocket-backed Verifier.
//!
//! ## Startup Sequence
//!
//! 1. Initialise telemetry from the environment
//! 2. Load the Validator descriptor and optional client configuration
//! 3. Build the Verifier client
//! 4. Serve HTTP until Ctrl-C, then close Validator connections

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing::{error, info};

use ledger_verifier::{ValidatorDescriptor, VerifierClient, VerifierConfig};
use verifier_gateway::config::{DEFAULT_STATUS_METHOD, DEFAULT_STATUS_ROUTE};
use verifier_gateway::{router, GatewayConfig, GatewayState, VerifierInvoker};
use verifier_telemetry::{init_telemetry, TelemetryConfig};

#[derive(Debug, Parser)]
#[command(name = "verifier-gateway", version, about = "HTTP gateway over a ledger Validator")]
struct Cli {
    /// Validator descriptor (JSON with validatorID, validatorURL, validatorKeyPath)
    #[arg(long, env = "VERIFIER_DESCRIPTOR")]
    descriptor: PathBuf,

    /// Verifier client configuration (JSON)
    #[arg(long, env = "VERIFIER_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "GATEWAY_LISTEN", default_value = "127.0.0.1:4000")]
    listen: SocketAddr,

    /// Contract identifier; parsed as JSON when possible, else used as a string
    #[arg(long, env = "GATEWAY_CONTRACT")]
    contract: String,

    #[arg(long, env = "GATEWAY_METHOD", default_value = DEFAULT_STATUS_METHOD)]
    method: String,

    #[arg(long, env = "GATEWAY_ROUTE", default_value = DEFAULT_STATUS_ROUTE)]
    route: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _telemetry =
        init_telemetry(TelemetryConfig::from_env()).context("failed to initialise telemetry")?;

    let descriptor = load_descriptor(&cli.descriptor).await?;
    let verifier_config = match &cli.config {
        Some(path) => load_verifier_config(path).await?,
        None => VerifierConfig::default(),
    };
    let timeout = verifier_config.sync_function_timeout;

    let gateway_config = GatewayConfig {
        listen: cli.listen,
        contract: serde_json::from_str(&cli.contract).unwrap_or(Value::String(cli.contract)),
        method: cli.method,
        route: cli.route,
    };
    gateway_config
        .validate()
        .context("invalid gateway configuration")?;

    let client = Arc::new(
        VerifierClient::websocket(descriptor, verifier_config)
            .context("failed to build verifier client")?,
    );
    let invoker = VerifierInvoker::new(client.clone(), timeout);
    let app = router(GatewayState::new(Arc::new(invoker), gateway_config.clone()));

    let listener = tokio::net::TcpListener::bind(gateway_config.listen)
        .await
        .with_context(|| format!("failed to bind {}", gateway_config.listen))?;
    info!(
        addr = %gateway_config.listen,
        route = %gateway_config.route,
        validator_id = %client.descriptor().validator_id,
        "Starting gateway"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    client.shutdown().await;
    info!(stats = ?client.stats(), "Gateway stopped");
    Ok(())
}

async fn load_descriptor(path: &Path) -> Result<ValidatorDescriptor> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read descriptor {}", path.display()))?;
    ValidatorDescriptor::from_json(&json)
        .with_context(|| format!("invalid descriptor {}", path.display()))
}

async fn load_verifier_config(path: &Path) -> Result<VerifierConfig> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("invalid config {}", path.display()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
