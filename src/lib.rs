//! alertrelay - an Alertmanager webhook receiver that fans alerts out to
//! notification destinations.
//!
//! This library provides the ingestion pipeline: request parsing for both the
//! Alertmanager envelope and bare alert arrays, the destination registry that
//! dispatches each alert to every configured destination concurrently, and the
//! destination adapters themselves.

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod destinations;
pub mod ingress;
pub mod internal_metrics;
pub mod registry;
pub mod server;
pub mod task_manager;

// Re-export core types for convenience
pub use crate::core::*;
