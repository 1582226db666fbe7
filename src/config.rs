//! Configuration management for alertrelay
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer defaults, a TOML or YAML file, `ALERTRELAY_*` environment
//! variables and command-line arguments.

use crate::cli::Cli;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The default configuration file, used when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "alertrelay.toml";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// The log output format.
    pub log_format: LogFormat,
    /// Configuration for the alert ingress server.
    pub server: ServerConfig,
    /// Configuration for the Prometheus metrics endpoint.
    pub metrics: MetricsConfig,
    /// Configuration for alert dispatch.
    pub dispatch: DispatchConfig,
    /// The ordered list of notification destinations.
    pub destinations: Vec<DestinationConfig>,
}

/// The format of log lines written to stdout.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Configuration for the alert ingress server.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// The address to bind the ingress listener to.
    pub bind_address: IpAddr,
    /// The port serving `/alerts`, `/health` and the landing page.
    pub port: u16,
    /// Request bodies larger than this are rejected as unreadable.
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

/// Configuration for the Prometheus metrics endpoint.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Whether to install the Prometheus recorder and serve `/metrics`.
    pub enabled: bool,
    /// The address to bind the metrics listener to.
    pub bind_address: IpAddr,
    /// The port serving `/metrics`.
    pub port: u16,
}

impl MetricsConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

/// Configuration for alert dispatch.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DispatchConfig {
    /// The maximum time one destination may spend on one alert, in milliseconds.
    pub timeout_ms: u64,
}

impl DispatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Describes one notification destination.
///
/// The `config` table is free-form here; each destination type validates its
/// own settings when it is constructed.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DestinationConfig {
    /// The destination type: basic, slack, email, webhook or pagerduty.
    #[serde(rename = "type")]
    pub kind: String,
    /// Destinations are skipped unless explicitly enabled.
    #[serde(default)]
    pub enabled: bool,
    /// A name used in logs. Defaults to the destination type.
    #[serde(default)]
    pub name: String,
    /// Type-specific settings.
    #[serde(default)]
    pub config: serde_json::Value,
}

impl DestinationConfig {
    /// Returns the configured name, falling back to the destination type.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.kind
        } else {
            &self.name
        }
    }
}

impl Config {
    /// Loads the application configuration by layering defaults, the
    /// configuration file, environment variables and command-line arguments.
    ///
    /// A missing configuration file is not an error; defaults apply.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(file_provider(&config_path))
            // e.g., ALERTRELAY_SERVER__PORT=9090
            .merge(Env::prefixed("ALERTRELAY_").split("__").ignore(&["config"]))
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }
}

/// Picks the file format from the extension. Anything that is not YAML is
/// read as TOML.
fn file_provider(path: &Path) -> Figment {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => Figment::from(Yaml::file(path)),
        _ => Figment::from(Toml::file(path)),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            server: ServerConfig {
                bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                port: 8080,
                max_body_bytes: 10 * 1024 * 1024,
            },
            metrics: MetricsConfig {
                enabled: true,
                bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                port: 2112,
            },
            dispatch: DispatchConfig { timeout_ms: 5_000 },
            destinations: vec![],
        }
    }
}
