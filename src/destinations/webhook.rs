//! A destination that forwards the alert JSON to an arbitrary HTTP endpoint.

use super::{default_timeout_ms, http_client, require, DestinationConfigError};
use crate::core::{Alert, DeliveryError, Destination};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

pub const KIND: &str = "webhook";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSettings {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_method() -> String {
    "POST".to_string()
}

/// Sends each alert, serialized as JSON, with the configured method and headers.
pub struct WebhookDestination {
    name: String,
    url: String,
    method: Method,
    headers: HeaderMap,
    client: reqwest::Client,
}

impl WebhookDestination {
    pub fn new(name: String, settings: WebhookSettings) -> Result<Self, DestinationConfigError> {
        require(KIND, "url", &settings.url)?;

        let method = Method::from_bytes(settings.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| DestinationConfigError::InvalidSetting {
                kind: KIND,
                setting: "method",
            })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (key, value) in &settings.headers {
            let (Ok(key), Ok(value)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) else {
                return Err(DestinationConfigError::InvalidSetting {
                    kind: KIND,
                    setting: "headers",
                });
            };
            headers.insert(key, value);
        }

        let client = http_client(Duration::from_millis(settings.timeout_ms))?;
        Ok(Self {
            name,
            url: settings.url,
            method,
            headers,
            client,
        })
    }
}

#[async_trait]
impl Destination for WebhookDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        KIND
    }

    async fn send(&self, alert: &Alert) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(alert)?;
        let response = self
            .client
            .request(self.method.clone(), &self.url)
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(destination = %self.name, status = %status, url = %self.url, "Webhook rejected the alert");
            return Err(DeliveryError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        debug!(destination = %self.name, "Sent alert to webhook");
        Ok(())
    }
}
