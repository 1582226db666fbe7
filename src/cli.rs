//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged over
//! the configuration file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Receives Alertmanager webhooks and forwards each alert to every configured destination.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML or YAML configuration file.
    #[arg(short, long, value_name = "FILE", env = "ALERTRELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port for the alert ingress server.
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Port for the Prometheus metrics server.
    #[arg(long, value_name = "PORT")]
    pub metrics_port: Option<u16>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json_logs: bool,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(port) = self.port {
            dict.insert("server".into(), nested("port", Value::from(port)));
        }

        if let Some(port) = self.metrics_port {
            dict.insert("metrics".into(), nested("port", Value::from(port)));
        }

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        // Only an explicit flag overrides the configured format.
        if self.json_logs {
            dict.insert("log_format".into(), Value::from("json"));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

fn nested(key: &str, value: Value) -> Value {
    let mut dict = Dict::new();
    dict.insert(key.into(), value);
    Value::from(dict)
}
