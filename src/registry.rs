//! The destination registry.
//!
//! Holds the set of active destinations and dispatches each alert to all of
//! them concurrently. Every delivery runs in its own task behind a timeout,
//! so a slow, failing or panicking destination only affects itself.

use crate::config::DestinationConfig;
use crate::core::{Alert, Destination};
use crate::destinations;
use crate::internal_metrics::Metrics;
use futures::future::join_all;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// The process-lifetime set of destinations.
///
/// Registration takes the write lock only for the append; dispatch takes the
/// read lock while it launches deliveries, so many dispatches run in parallel.
pub struct DestinationRegistry {
    destinations: RwLock<Vec<Arc<dyn Destination>>>,
    metrics: Metrics,
    timeout: Duration,
}

impl DestinationRegistry {
    /// Creates an empty registry.
    ///
    /// # Arguments
    /// * `metrics` - Receives the outcome of every delivery.
    /// * `timeout` - The longest a single destination may take for one alert.
    pub fn new(metrics: Metrics, timeout: Duration) -> Self {
        Self {
            destinations: RwLock::new(Vec::new()),
            metrics,
            timeout,
        }
    }

    /// Appends a destination to the active set.
    pub async fn register(&self, destination: Arc<dyn Destination>) {
        debug!(
            destination = destination.name(),
            kind = destination.kind(),
            "Registering destination"
        );
        self.destinations.write().await.push(destination);
    }

    /// Builds and registers every enabled destination in `configs`.
    ///
    /// Disabled entries are skipped. Entries that fail to build are logged
    /// and skipped so one bad descriptor does not take the others down.
    /// Returns the number of destinations registered.
    pub async fn register_from_config(&self, configs: &[DestinationConfig]) -> usize {
        let mut registered = 0;
        for config in configs {
            let name = config.display_name();
            if !config.enabled {
                info!(destination = name, "Destination disabled, skipping");
                continue;
            }

            match destinations::build(config) {
                Ok(destination) => {
                    self.register(destination).await;
                    registered += 1;
                    info!(destination = name, kind = %config.kind, "Registered destination");
                }
                Err(e) => {
                    error!(destination = name, error = %e, "Failed to create destination");
                }
            }
        }
        registered
    }

    /// Returns the number of registered destinations.
    pub async fn len(&self) -> usize {
        self.destinations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.destinations.read().await.is_empty()
    }

    /// Returns the names of the registered destinations in registration order.
    pub async fn names(&self) -> Vec<String> {
        self.destinations
            .read()
            .await
            .iter()
            .map(|d| d.name().to_string())
            .collect()
    }

    /// Dispatches one alert to every registered destination.
    ///
    /// Returns once every delivery has finished, failed, timed out or
    /// panicked. Outcomes are recorded in the metrics, never returned.
    pub async fn dispatch(&self, alert: Arc<Alert>) {
        let handles = {
            let destinations = self.destinations.read().await;

            if destinations.is_empty() {
                warn!("No destinations registered, alert will not be processed");
                return;
            }

            destinations
                .iter()
                .map(|destination| {
                    let destination = Arc::clone(destination);
                    let alert = Arc::clone(&alert);
                    let metrics = self.metrics.clone();
                    let timeout = self.timeout;
                    let name = destination.name().to_string();
                    let handle = tokio::spawn(async move {
                        let delivery = destination.process(&alert, &metrics);
                        if tokio::time::timeout(timeout, delivery).await.is_err() {
                            metrics.processing_errors_total.increment(1);
                            error!(
                                destination = destination.name(),
                                kind = destination.kind(),
                                timeout_ms = timeout.as_millis() as u64,
                                "Destination timed out"
                            );
                        }
                    });
                    (name, handle)
                })
                .collect::<Vec<_>>()
        };

        let (names, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let results = join_all(handles).await;

        for (name, result) in names.iter().zip(results) {
            if let Err(e) = result {
                self.metrics.processing_errors_total.increment(1);
                if e.is_panic() {
                    error!(
                        destination = name.as_str(),
                        panic = panic_message(e.into_panic()).as_str(),
                        "Destination panicked"
                    );
                } else {
                    error!(destination = name.as_str(), error = %e, "Destination task failed");
                }
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
