//! DMS Server, the hierarchical document management core
//!
//! Loads configuration, wires the document manager, and logs change events
//! until shutdown.

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use dms_core::config::DmsConfig;
use dms_service::DocumentManager;

#[tokio::main]
async fn main() {
    let env = std::env::var("DMS_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match DmsConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {e:#}");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &DmsConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: DmsConfig) -> anyhow::Result<()> {
    tracing::info!("Starting DMS v{}", env!("CARGO_PKG_VERSION"));

    let dms = DocumentManager::new(&config)
        .await
        .context("Failed to initialize document manager")?;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let mut events = dms.subscribe();
    let event_logger = tokio::spawn(async move {
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => tracing::debug!(
                        node = %event.node,
                        change = ?event.change,
                        fields = ?event.changed_fields,
                        operation_id = ?event.operation_id,
                        "Change event"
                    ),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Change event logger lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown_rx.changed() => break,
            }
        }
    });

    tracing::info!("DMS ready");
    shutdown_signal().await?;
    tracing::info!("Shutdown signal received, stopping...");

    let _ = shutdown_tx.send(true);
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), event_logger).await;

    tracing::info!("DMS stopped");
    Ok(())
}

async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("Failed to install Ctrl+C handler")?,
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("Failed to install Ctrl+C handler")?;

    Ok(())
}
