//! # Internal Metrics Module
//!
//! This module provides the infrastructure for collecting and exposing the
//! relay's metrics.
//!
//! ## Components:
//!
//! - **`MetricsBuilder`**: The entry point for initializing the metrics system.
//!   It installs the Prometheus recorder, binds the metrics listener, and
//!   constructs the `Metrics` handle.
//!
//! - **`Metrics`**: A lightweight, cloneable struct passed to the ingress
//!   endpoint, the registry and every destination. It holds the handles for
//!   the predefined counters and the processing-duration histogram.
//!
//! - **`MetricsServer`**: (Defined in `server.rs`) An `axum`-based web server
//!   that exposes the `/metrics` endpoint on its own port.

use crate::config::MetricsConfig;
use crate::internal_metrics::server::MetricsServer;
use anyhow::{Context, Result};
use metrics::{Counter, Histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

pub mod server;

pub const ALERTS_RECEIVED_TOTAL: &str = "alerts_received_total";
pub const ALERTS_PROCESSED_TOTAL: &str = "alerts_processed_total";
pub const PROCESSING_ERRORS_TOTAL: &str = "processing_errors_total";
pub const PROCESSING_DURATION_SECONDS: &str = "processing_duration_seconds";

/// The public API for the metrics system.
///
/// All handles are safe to update concurrently from any task.
#[derive(Clone)]
pub struct Metrics {
    pub alerts_received_total: Counter,
    pub alerts_processed_total: Counter,
    pub processing_errors_total: Counter,
    pub processing_duration_seconds: Histogram,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Creates a new `Metrics` instance and registers descriptions for all
    /// supported metrics with the current recorder.
    ///
    /// Handles are bound to whichever recorder is active when this is called,
    /// so tests can build one under `metrics::with_local_recorder`.
    pub fn new() -> Self {
        // Descriptions (for Prometheus)
        metrics::describe_counter!(ALERTS_RECEIVED_TOTAL, Unit::Count, "Total number of alerts received by the handler.");
        metrics::describe_counter!(ALERTS_PROCESSED_TOTAL, Unit::Count, "Total number of alerts successfully delivered to a destination.");
        metrics::describe_counter!(PROCESSING_ERRORS_TOTAL, Unit::Count, "Total number of failed, timed out or panicked destination deliveries.");
        metrics::describe_histogram!(PROCESSING_DURATION_SECONDS, Unit::Seconds, "Time taken to dispatch one inbound batch to all destinations.");

        // Handles (for application use)
        Self {
            alerts_received_total: metrics::counter!(ALERTS_RECEIVED_TOTAL),
            alerts_processed_total: metrics::counter!(ALERTS_PROCESSED_TOTAL),
            processing_errors_total: metrics::counter!(PROCESSING_ERRORS_TOTAL),
            processing_duration_seconds: metrics::histogram!(PROCESSING_DURATION_SECONDS),
        }
    }

    /// Creates a `Metrics` instance that performs no operations.
    /// Used when metrics are disabled in the configuration.
    pub fn disabled() -> Self {
        Self {
            alerts_received_total: Counter::noop(),
            alerts_processed_total: Counter::noop(),
            processing_errors_total: Counter::noop(),
            processing_duration_seconds: Histogram::noop(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the metrics system.
///
/// This builder is responsible for installing the Prometheus recorder,
/// binding the metrics listener and creating the `Metrics` handle.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    /// Creates a new `MetricsBuilder` with the given configuration.
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Initializes the metrics system and returns a `Metrics` handle and an
    /// optional `MetricsServer` along with its bound address.
    ///
    /// If metrics are disabled in the configuration, this method returns a
    /// disabled `Metrics` instance and `None` for the server.
    pub async fn build(
        self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(Metrics, Option<(MetricsServer, SocketAddr)>)> {
        if !self.config.enabled {
            info!("Metrics are disabled.");
            return Ok((Metrics::disabled(), None));
        }

        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )
            .context("invalid histogram buckets")?
            .build_recorder();
        let handle = recorder.handle();

        // Bind before installing the recorder so a port conflict leaves the
        // global recorder untouched.
        let listener = TcpListener::bind(self.config.socket_addr())
            .await
            .with_context(|| {
                format!("failed to bind metrics server to {}", self.config.socket_addr())
            })?;
        let addr = listener
            .local_addr()
            .context("failed to get local address for metrics server")?;

        metrics::set_global_recorder(recorder)
            .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;

        let metrics = Metrics::new();
        let server = MetricsServer::new(listener, handle, shutdown_rx);

        Ok((metrics, Some((server, addr))))
    }
}
