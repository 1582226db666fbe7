//! Core domain types and service traits for alertrelay
//!
//! This module defines the alert data model received from Alertmanager and
//! the `Destination` trait contract that every notification adapter
//! implements.

use crate::internal_metrics::Metrics;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, info};

/// The lifecycle state reported for an alert.
///
/// Alertmanager only sends `firing` and `resolved`, but the field is a free
/// string on the wire and anything else is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertStatus {
    Firing,
    Resolved,
    Other(String),
}

impl AlertStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AlertStatus::Firing => "firing",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Other(s) => s.as_str(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, AlertStatus::Resolved)
    }
}

impl Default for AlertStatus {
    fn default() -> Self {
        AlertStatus::Other(String::new())
    }
}

impl From<String> for AlertStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "firing" => AlertStatus::Firing,
            "resolved" => AlertStatus::Resolved,
            _ => AlertStatus::Other(value),
        }
    }
}

impl From<AlertStatus> for String {
    fn from(status: AlertStatus) -> Self {
        match status {
            AlertStatus::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a single alert notification.
///
/// Alerts are read-only once parsed; one instance is shared by every
/// destination it is dispatched to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: AlertStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<String>,
    #[serde(default, rename = "generatorURL", skip_serializing_if = "Option::is_none")]
    pub generator_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl Alert {
    /// Creates a firing alert with the given `alertname` label.
    pub fn firing(alert_name: &str) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert("alertname".to_string(), alert_name.to_string());
        Self {
            status: AlertStatus::Firing,
            labels,
            ..Default::default()
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    pub fn alert_name(&self) -> Option<&str> {
        self.label("alertname")
    }

    pub fn severity(&self) -> Option<&str> {
        self.label("severity")
    }

    pub fn instance(&self) -> Option<&str> {
        self.label("instance")
    }

    pub fn summary(&self) -> Option<&str> {
        self.annotation("summary")
    }

    pub fn description(&self) -> Option<&str> {
        self.annotation("description")
    }
}

/// The Alertmanager webhook envelope wrapping a group of alerts.
///
/// Every field defaults when absent, so any JSON object decodes as an
/// envelope. Callers decide whether an empty `alerts` list makes it usable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AlertGroup {
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub group_key: String,
    #[serde(default)]
    pub truncated_alerts: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub receiver: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub group_labels: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub common_labels: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub common_annotations: BTreeMap<String, String>,
    #[serde(default, rename = "externalURL", deserialize_with = "null_as_default")]
    pub external_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub alerts: Vec<Alert>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Errors raised while transmitting an alert to a destination.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("destination returned unexpected status {status}")]
    UnexpectedStatus { status: u16 },

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to render template: {0}")]
    Render(#[from] tera::Error),

    #[error("failed to build email message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

// =============================================================================
// Service Traits
// =============================================================================

/// A configured notification target (chat, email, incident API, webhook, log).
///
/// Implementations hold only immutable configuration captured at construction
/// and must tolerate concurrent calls for overlapping alerts.
#[async_trait]
pub trait Destination: Send + Sync {
    /// The configured name of this destination. Used for logging.
    fn name(&self) -> &str;

    /// The destination type (e.g., "slack", "email").
    fn kind(&self) -> &'static str;

    /// Transmits an alert to the destination.
    ///
    /// # Returns
    /// * `Ok(())` if the destination accepted the alert
    /// * `Err` on network failure, a rejected request, or an encoding error
    async fn send(&self, alert: &Alert) -> Result<(), DeliveryError>;

    /// Processes one alert: logs intent, transmits it once and records the
    /// outcome. Failures end here and are never returned to the caller.
    async fn process(&self, alert: &Alert, metrics: &Metrics) {
        info!(
            destination = self.name(),
            kind = self.kind(),
            status = %alert.status,
            "Processing alert"
        );

        match self.send(alert).await {
            Ok(()) => {
                metrics.alerts_processed_total.increment(1);
                info!(destination = self.name(), kind = self.kind(), "Alert delivered");
            }
            Err(e) => {
                metrics.processing_errors_total.increment(1);
                error!(
                    destination = self.name(),
                    kind = self.kind(),
                    error = %e,
                    "Failed to deliver alert"
                );
            }
        }
    }
}
