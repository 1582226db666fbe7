//! alertrelay - Alertmanager webhook relay
//!
//! Receives Prometheus Alertmanager notifications over HTTP and forwards each
//! alert to every configured destination.

use alertrelay::{
    app::App,
    cli::Cli,
    config::{Config, LogFormat},
};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).context("failed to load configuration")?;

    init_tracing(&config);

    info!("alertrelay starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Ingress Address: {}", config.server.socket_addr());
    info!("Max Body Size: {} bytes", config.server.max_body_bytes);
    if config.metrics.enabled {
        info!("Metrics Address: {}", config.metrics.socket_addr());
    } else {
        info!("Metrics: Disabled");
    }
    info!("Dispatch Timeout: {}ms", config.dispatch.timeout_ms);
    info!("Configured Destinations: {}", config.destinations.len());
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = App::builder(config).build(shutdown_rx).await?;

    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received. Shutting down gracefully...");
        if shutdown_tx.send(true).is_err() {
            error!("Failed to send shutdown signal; application already stopped");
        }
    });

    app.run().await?;

    info!("alertrelay stopped.");
    Ok(())
}

/// `RUST_LOG` wins over the configured level when it is set.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
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
}
