//! A destination that posts alerts to a Slack incoming webhook.

use super::{default_timeout_ms, http_client, require, DestinationConfigError};
use crate::core::{Alert, DeliveryError, Destination};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const KIND: &str = "slack";

/// Settings read from the descriptor's `config` table.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackSettings {
    pub webhook_url: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_icon_emoji")]
    pub icon_emoji: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_username() -> String {
    "Prometheus Alerts".to_string()
}

fn default_icon_emoji() -> String {
    ":fire:".to_string()
}

/// Posts one attachment per alert to a Slack webhook.
pub struct SlackDestination {
    name: String,
    settings: SlackSettings,
    client: reqwest::Client,
}

impl SlackDestination {
    pub fn new(name: String, settings: SlackSettings) -> Result<Self, DestinationConfigError> {
        require(KIND, "webhook_url", &settings.webhook_url)?;
        let client = http_client(Duration::from_millis(settings.timeout_ms))?;
        Ok(Self {
            name,
            settings,
            client,
        })
    }

    /// Builds the webhook payload for an alert.
    pub fn payload(&self, alert: &Alert) -> Value {
        let mut fields = vec![
            json!({ "title": "Status", "value": alert.status.as_str(), "short": true }),
            json!({ "title": "Severity", "value": alert.severity().unwrap_or_default(), "short": true }),
        ];
        if let Some(instance) = alert.instance() {
            fields.push(json!({ "title": "Instance", "value": instance, "short": true }));
        }

        let title = match alert.alert_name() {
            Some(name) => format!("Alert: {}", name),
            None => "Prometheus Alert".to_string(),
        };
        let text = alert
            .description()
            .or_else(|| alert.summary())
            .unwrap_or_default();

        let mut payload = json!({
            "username": self.settings.username,
            "icon_emoji": self.settings.icon_emoji,
            "attachments": [{
                "color": attachment_color(alert),
                "title": title,
                "text": text,
                "fields": fields,
                "footer": "alertrelay",
                "ts": chrono::Utc::now().timestamp(),
            }],
        });
        if let Some(channel) = self.settings.channel.as_deref().filter(|c| !c.is_empty()) {
            payload["channel"] = json!(channel);
        }
        payload
    }
}

/// Resolved alerts are green; firing ones are colored by severity.
fn attachment_color(alert: &Alert) -> &'static str {
    if alert.status.is_resolved() {
        return "good";
    }
    match alert.severity() {
        Some("critical") => "danger",
        Some("warning") => "warning",
        _ => "#439FE0",
    }
}

#[async_trait]
impl Destination for SlackDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        KIND
    }

    async fn send(&self, alert: &Alert) -> Result<(), DeliveryError> {
        let payload = self.payload(alert);
        let response = self
            .client
            .post(&self.settings.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(destination = %self.name, status = %status, body = %body, "Slack rejected the notification");
            return Err(DeliveryError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        debug!(destination = %self.name, "Sent alert to Slack");
        Ok(())
    }
}
