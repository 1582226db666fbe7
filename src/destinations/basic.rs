//! A destination that only writes alerts to the log.
//!
//! Registered as a fallback when no other destination is configured.

use crate::core::{Alert, DeliveryError, Destination};
use async_trait::async_trait;
use tracing::{error, info, warn};

pub const KIND: &str = "basic";

/// Logs each alert at a level matching its `severity` label.
#[derive(Debug, Clone)]
pub struct LogDestination {
    name: String,
}

impl LogDestination {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for LogDestination {
    fn default() -> Self {
        Self::new("default-basic")
    }
}

#[async_trait]
impl Destination for LogDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        KIND
    }

    async fn send(&self, alert: &Alert) -> Result<(), DeliveryError> {
        let alert_name = alert.alert_name().unwrap_or_default();

        match alert.severity() {
            Some("critical") => {
                error!(alertname = alert_name, status = %alert.status, labels = ?alert.labels, "Critical alert");
            }
            Some("warning") => {
                warn!(alertname = alert_name, status = %alert.status, labels = ?alert.labels, "Warning alert");
            }
            Some(severity) => {
                warn!(alertname = alert_name, severity, "Unknown severity");
            }
            None => {
                warn!(alertname = alert_name, "Alert has no severity label");
            }
        }

        info!(?alert, "Logged alert");
        Ok(())
    }
}
