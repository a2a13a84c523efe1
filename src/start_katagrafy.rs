//! Startup helpers for the Katagrafy proxy.

use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::server::{self, AppState};

/// Run the proxy (used by the `katagrafy-proxy` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Katagrafy proxy v{}", env!("CARGO_PKG_VERSION"));

    let (config, state) = match initialize() {
        Ok(initialized) => initialized,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(run_server_with_shutdown(
        state,
        config.server.port,
        shutdown_signal(),
    )) {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    tracing::info!("Katagrafy proxy stopped");
    ExitCode::SUCCESS
}

/// Load and validate configuration, then build the proxy state.
///
/// # Errors
/// Returns an error if configuration is invalid or no Gemini key is set.
pub fn initialize()
-> Result<(AppConfig, Arc<AppState>), Box<dyn std::error::Error + Send + Sync>> {
    let config = AppConfig::from_env().map_err(|e| format!("Invalid configuration: {e}"))?;
    config
        .validate()
        .map_err(|e| format!("Invalid configuration: {e}"))?;
    let state = AppState::new(&config).map_err(|e| format!("Failed to create state: {e}"))?;
    Ok((config, state))
}

/// Run server with graceful shutdown.
///
/// # Errors
/// Returns an error if the server fails.
pub async fn run_server_with_shutdown<F>(
    state: Arc<AppState>,
    port: u16,
    shutdown_signal: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    server::run_server_with_shutdown(state, port, shutdown_signal).await
}

/// Resolves on Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
