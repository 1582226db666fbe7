//! Notification destinations and the factory that builds them from config.
//!
//! Each destination type lives in its own module and implements
//! [`Destination`]. Settings come from the free-form `config` table of a
//! [`DestinationConfig`] and are validated once, at construction.

use crate::config::DestinationConfig;
use crate::core::Destination;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod basic;
pub mod email;
pub mod pagerduty;
pub mod slack;
pub mod webhook;

pub use self::basic::LogDestination;
pub use self::email::EmailDestination;
pub use self::pagerduty::PagerDutyDestination;
pub use self::slack::SlackDestination;
pub use self::webhook::WebhookDestination;

/// The client-side timeout for outbound requests when none is configured.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while building a destination from its descriptor.
#[derive(Debug, Error)]
pub enum DestinationConfigError {
    #[error("unknown destination type: {0}")]
    UnknownKind(String),

    #[error("invalid {kind} settings: {source}")]
    InvalidSettings {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} setting `{setting}` is required")]
    MissingSetting {
        kind: &'static str,
        setting: &'static str,
    },

    #[error("{kind} setting `{setting}` is invalid")]
    InvalidSetting {
        kind: &'static str,
        setting: &'static str,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid template: {0}")]
    Template(#[from] tera::Error),

    #[error("invalid SMTP relay: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Builds the destination described by `config`.
pub fn build(config: &DestinationConfig) -> Result<Arc<dyn Destination>, DestinationConfigError> {
    let name = config.display_name().to_string();
    let destination: Arc<dyn Destination> = match config.kind.as_str() {
        basic::KIND => Arc::new(LogDestination::new(name)),
        slack::KIND => Arc::new(SlackDestination::new(name, settings(slack::KIND, config)?)?),
        email::KIND => Arc::new(EmailDestination::new(name, settings(email::KIND, config)?)?),
        webhook::KIND => Arc::new(WebhookDestination::new(name, settings(webhook::KIND, config)?)?),
        pagerduty::KIND => Arc::new(PagerDutyDestination::new(
            name,
            settings(pagerduty::KIND, config)?,
        )?),
        other => return Err(DestinationConfigError::UnknownKind(other.to_string())),
    };
    Ok(destination)
}

/// Deserializes the type-specific settings. A missing table reads as empty.
fn settings<T: DeserializeOwned>(
    kind: &'static str,
    config: &DestinationConfig,
) -> Result<T, DestinationConfigError> {
    let value = match &config.config {
        serde_json::Value::Null => serde_json::Value::Object(Default::default()),
        value => value.clone(),
    };
    serde_json::from_value(value)
        .map_err(|source| DestinationConfigError::InvalidSettings { kind, source })
}

/// Rejects an empty required string setting.
fn require(
    kind: &'static str,
    setting: &'static str,
    value: &str,
) -> Result<(), DestinationConfigError> {
    if value.trim().is_empty() {
        return Err(DestinationConfigError::MissingSetting { kind, setting });
    }
    Ok(())
}

/// Builds the HTTP client shared by all requests of one destination.
fn http_client(timeout: Duration) -> Result<reqwest::Client, DestinationConfigError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

fn default_timeout_ms() -> u64 {
    DEFAULT_CLIENT_TIMEOUT.as_millis() as u64
}
