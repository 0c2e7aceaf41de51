//! # Initialization
//!
//! Operator start-up: rustls setup, tracing, metrics, the probe server,
//! the Kubernetes client and the shared reconciliation contexts.

use crate::chart::ManifestCache;
use crate::config::{ControllerConfig, FunctionConfig, ServerConfig};
use crate::controller::function::FunctionContext;
use crate::controller::server::{start_server, ServerState};
use crate::controller::serverless::ServerlessContext;
use crate::observability;
use anyhow::{Context, Result};
use kube::Client;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    pub controller_config: ControllerConfig,
    pub function_ctx: Arc<FunctionContext>,
    pub serverless_ctx: Arc<ServerlessContext>,
    pub server_state: Arc<ServerState>,
    /// Cancelled on shutdown; in-flight passes stop between steps
    pub shutdown: CancellationToken,
}

/// Initialize the operator runtime
///
/// The probe server is started and ready before the client is created so
/// liveness checks pass while the API server is slow to answer.
pub async fn initialize() -> Result<InitializationResult> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "serverless_operator=info".into()),
        )
        .init();

    info!("Starting Serverless Operator v{}", env!("CARGO_PKG_VERSION"));

    let server_config = ServerConfig::from_env();
    let controller_config = ControllerConfig::from_env();
    let function_config = FunctionConfig::from_env();
    info!(
        operator_namespace = %controller_config.operator_namespace,
        chart_path = %controller_config.chart_path,
        "Configuration loaded"
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = Arc::clone(&server_state);
    let server_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let shutdown = CancellationToken::new();
    let function_ctx = Arc::new(FunctionContext::new(
        client.clone(),
        function_config,
        controller_config.clone(),
        shutdown.clone(),
    ));
    let serverless_ctx = Arc::new(ServerlessContext::new(
        client.clone(),
        controller_config.clone(),
        ManifestCache::default(),
        shutdown.clone(),
    ));

    info!("Operator initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        controller_config,
        function_ctx,
        serverless_ctx,
        server_state,
        shutdown,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &ServerState,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &ServerConfig,
) -> Result<()> {
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > config.startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                config.startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(config.poll_interval).await;
    }
}
