//! Podline controller
//!
//! HTTP control surface that turns service definitions into containers
//! running on this host, through the Docker CLI.

mod config;
mod dto;
mod handlers;
mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use podline_docker::{DockerCliRuntime, DockerConfig};
use podline_domain::{engine::ControllerConfig, PodController, PortAllocator, ServiceRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ServiceRegistry<DockerCliRuntime>>,
    /// Cancelled once the process starts shutting down
    pub cancel: CancellationToken,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let settings = Settings::from_env()?;

    init_tracing(settings.log_json);
    info!("Starting Podline controller");

    let runtime = DockerCliRuntime::new(DockerConfig {
        binary: settings.docker_binary.clone(),
        command_timeout: settings.docker_timeout,
        ..DockerConfig::default()
    })?;
    let version = runtime
        .ping()
        .await
        .context("Docker is not reachable, is the daemon running?")?;
    info!(version = %version, "Connected to Docker");

    info!(
        min = settings.port_range.min(),
        max = settings.port_range.max(),
        gpu_enabled = settings.gpu_enabled,
        "Initializing pod controller"
    );
    let controller = PodController::new(
        runtime,
        PortAllocator::new(settings.port_range),
        ControllerConfig {
            gpu_enabled: settings.gpu_enabled,
            ..ControllerConfig::default()
        },
    );
    let registry = Arc::new(ServiceRegistry::new(Arc::new(controller)));

    let cancel = CancellationToken::new();
    let state = AppState {
        registry: Arc::clone(&registry),
        cancel: cancel.clone(),
    };

    // Build HTTP router
    let app = routes::create_router(state);

    let addr = settings.bind_address();
    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    // A second interrupt abandons the teardown, leaving remaining pods running
    let teardown = CancellationToken::new();
    let abandon = teardown.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted again, abandoning teardown");
            abandon.cancel();
        }
    });

    info!("Stopping all pods");
    let report = registry.shutdown(&teardown).await;
    watcher.abort();

    info!(
        attempted = report.attempted(),
        stopped = report.stopped,
        failed = report.failed,
        cancelled = report.cancelled,
        "Podline controller stopped"
    );
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    cancel.cancel();
}
