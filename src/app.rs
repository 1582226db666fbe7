//! The main application wiring, decoupled from the entry point.

use crate::{
    config::Config,
    core::Destination,
    destinations::LogDestination,
    ingress::AlertIngress,
    internal_metrics::{Metrics, MetricsBuilder},
    registry::DestinationRegistry,
    server::{self, IngressServer},
    task_manager::TaskManager,
};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

/// A handle to the running application.
pub struct App {
    task_manager: TaskManager,
    registry: Arc<DestinationRegistry>,
    ingress_addr: SocketAddr,
    metrics_addr: Option<SocketAddr>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the alert ingress server is listening on.
    pub fn ingress_addr(&self) -> SocketAddr {
        self.ingress_addr
    }

    /// The address of the metrics server, if metrics are enabled.
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }

    pub fn registry(&self) -> Arc<DestinationRegistry> {
        self.registry.clone()
    }

    /// Waits for the shutdown signal and then gracefully shuts down all tasks.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.get_shutdown_rx();
        let _ = shutdown_rx.wait_for(|stop| *stop).await;
        info!("Shutdown signal received. Waiting for servers to drain...");

        self.task_manager.shutdown().await;

        info!("All tasks shut down.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// Separates constructing the components from running them, and lets tests
/// swap in their own destinations and metrics.
pub struct AppBuilder {
    config: Config,
    destinations_override: Option<Vec<Arc<dyn Destination>>>,
    metrics_override: Option<Metrics>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            destinations_override: None,
            metrics_override: None,
        }
    }

    /// Registers exactly these destinations instead of building them from
    /// the configuration. No fallback destination is added.
    pub fn destinations_override(mut self, destinations: Vec<Arc<dyn Destination>>) -> Self {
        self.destinations_override = Some(destinations);
        self
    }

    /// Overrides the metrics system for testing. No metrics server is started.
    pub fn metrics_override(mut self, metrics: Metrics) -> Self {
        self.metrics_override = Some(metrics);
        self
    }

    /// Builds every component, binds both listeners and spawns the servers.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let task_manager = TaskManager::new(shutdown_rx);

        // 1. Metrics
        let (metrics, metrics_server_info) = match self.metrics_override {
            Some(m) => (m, None),
            None => {
                MetricsBuilder::new(config.metrics.clone())
                    .build(task_manager.get_shutdown_rx())
                    .await?
            }
        };

        let metrics_addr = if let Some((server, addr)) = metrics_server_info {
            task_manager.spawn("MetricsServer", server.run());
            info!(address = %addr, "Metrics server listening");
            Some(addr)
        } else {
            None
        };

        // 2. Destinations
        let registry = Arc::new(DestinationRegistry::new(
            metrics.clone(),
            config.dispatch.timeout(),
        ));
        match self.destinations_override {
            Some(destinations) => {
                for destination in destinations {
                    registry.register(destination).await;
                }
            }
            None => {
                registry.register_from_config(&config.destinations).await;
                if registry.is_empty().await {
                    warn!("No destinations configured, falling back to the basic log destination");
                    registry.register(Arc::new(LogDestination::default())).await;
                }
            }
        }
        info!(
            count = registry.len().await,
            destinations = ?registry.names().await,
            "Destinations ready"
        );

        // 3. Ingress
        let ingress = AlertIngress::new(registry.clone(), metrics);
        let router = server::router(ingress, config.server.max_body_bytes);
        let listener = TcpListener::bind(config.server.socket_addr())
            .await
            .with_context(|| {
                format!("failed to bind ingress server to {}", config.server.socket_addr())
            })?;
        let ingress_addr = listener
            .local_addr()
            .context("failed to get local address for ingress server")?;

        let ingress_server = IngressServer::new(listener, router, task_manager.get_shutdown_rx());
        task_manager.spawn("IngressServer", ingress_server.run());
        info!(address = %ingress_addr, "Alert ingress listening");

        Ok(App {
            task_manager,
            registry,
            ingress_addr,
            metrics_addr,
        })
    }
}
