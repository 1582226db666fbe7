//! A destination that opens and resolves PagerDuty incidents through the
//! Events API v2.

use super::{default_timeout_ms, http_client, require, DestinationConfigError};
use crate::core::{Alert, DeliveryError, Destination};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

pub const KIND: &str = "pagerduty";

pub const DEFAULT_API_ENDPOINT: &str = "https://events.pagerduty.com/v2/enqueue";

#[derive(Debug, Clone, Deserialize)]
pub struct PagerDutySettings {
    pub integration_key: String,
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_api_endpoint() -> String {
    DEFAULT_API_ENDPOINT.to_string()
}

/// An Events API v2 request body.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PagerDutyEvent {
    pub routing_key: String,
    pub event_action: &'static str,
    pub dedup_key: String,
    pub payload: PagerDutyPayload,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<PagerDutyLink>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PagerDutyPayload {
    pub summary: String,
    pub source: String,
    pub severity: &'static str,
    pub custom_details: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PagerDutyLink {
    pub href: String,
    pub text: &'static str,
}

pub struct PagerDutyDestination {
    name: String,
    settings: PagerDutySettings,
    client: reqwest::Client,
}

impl PagerDutyDestination {
    pub fn new(name: String, settings: PagerDutySettings) -> Result<Self, DestinationConfigError> {
        require(KIND, "integration_key", &settings.integration_key)?;
        require(KIND, "api_endpoint", &settings.api_endpoint)?;
        let client = http_client(Duration::from_millis(settings.timeout_ms))?;
        Ok(Self {
            name,
            settings,
            client,
        })
    }

    /// Maps an alert onto an Events API v2 event.
    pub fn event(&self, alert: &Alert) -> PagerDutyEvent {
        let alert_name = alert.alert_name().unwrap_or_default();
        let instance = alert.instance().unwrap_or_default();

        let summary = alert
            .summary()
            .or_else(|| alert.description())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Alert: {}", alert_name));

        let mut custom_details = alert.labels.clone();
        for (key, value) in &alert.annotations {
            custom_details.insert(format!("annotation_{}", key), value.clone());
        }

        let dedup_key = match alert.fingerprint.as_deref().filter(|f| !f.is_empty()) {
            Some(fingerprint) => fingerprint.to_string(),
            None => format!("{}-{}", alert_name, instance),
        };

        let links = alert
            .generator_url
            .iter()
            .filter(|url| !url.is_empty())
            .map(|url| PagerDutyLink {
                href: url.clone(),
                text: "View in Prometheus",
            })
            .collect();

        PagerDutyEvent {
            routing_key: self.settings.integration_key.clone(),
            event_action: if alert.status.is_resolved() {
                "resolve"
            } else {
                "trigger"
            },
            dedup_key,
            payload: PagerDutyPayload {
                summary,
                source: instance.to_string(),
                severity: map_severity(alert.severity()),
                custom_details,
            },
            links,
        }
    }
}

fn map_severity(severity: Option<&str>) -> &'static str {
    match severity {
        Some("critical") => "critical",
        Some("warning") => "warning",
        Some("info") => "info",
        _ => "error",
    }
}

#[async_trait]
impl Destination for PagerDutyDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        KIND
    }

    async fn send(&self, alert: &Alert) -> Result<(), DeliveryError> {
        let event = self.event(alert);
        let response = self
            .client
            .post(&self.settings.api_endpoint)
            .json(&event)
            .send()
            .await?;

        // The Events API acknowledges an enqueued event with 202 only.
        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            debug!(destination = %self.name, status = %status, body = %body, "PagerDuty rejected the event");
            return Err(DeliveryError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        debug!(destination = %self.name, action = event.event_action, "Sent event to PagerDuty");
        Ok(())
    }
}
