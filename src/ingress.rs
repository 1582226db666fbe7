//! Alert ingestion.
//!
//! Turns an inbound request body into a non-empty list of alerts and drives
//! the registry with it. Two wire shapes are accepted, tried in order:
//!
//! 1. the Alertmanager webhook envelope (`AlertGroup`) with a non-empty
//!    `alerts` list;
//! 2. a bare JSON array of alerts.
//!
//! A body matching neither shape is rejected, never read as an empty batch.

use crate::core::{Alert, AlertGroup};
use crate::internal_metrics::Metrics;
use crate::registry::DestinationRegistry;
use axum::{
    body::Bytes,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Request-level failures. Each maps to one HTTP status code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngressError {
    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("could not read body")]
    BodyRead,

    #[error("invalid JSON format")]
    InvalidFormat,

    #[error("no alerts in request")]
    EmptyAlertList,
}

impl IngressError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IngressError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            IngressError::BodyRead | IngressError::InvalidFormat | IngressError::EmptyAlertList => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl IntoResponse for IngressError {
    fn into_response(self) -> Response {
        let body = json!({ "status": "error", "error": self.to_string() });
        (self.status_code(), Json(body)).into_response()
    }
}

/// Where a batch of alerts came from.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertSource {
    /// An Alertmanager envelope; its status and receiver are kept for logging.
    Envelope { status: String, receiver: String },
    /// A bare array of alerts.
    Array,
}

/// A successfully parsed request body.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertBatch {
    pub source: AlertSource,
    pub alerts: Vec<Alert>,
}

/// Parses a request body into a non-empty batch of alerts.
pub fn parse_alerts(body: &[u8]) -> Result<AlertBatch, IngressError> {
    let batch = match serde_json::from_slice::<AlertGroup>(body) {
        Ok(group) if !group.alerts.is_empty() => AlertBatch {
            source: AlertSource::Envelope {
                status: group.status,
                receiver: group.receiver,
            },
            alerts: group.alerts,
        },
        _ => {
            let alerts = serde_json::from_slice::<Vec<Alert>>(body).map_err(|e| {
                debug!(error = %e, "Request body is neither an envelope nor an alert array");
                IngressError::InvalidFormat
            })?;
            AlertBatch {
                source: AlertSource::Array,
                alerts,
            }
        }
    };

    if batch.alerts.is_empty() {
        return Err(IngressError::EmptyAlertList);
    }

    Ok(batch)
}

/// The success response body for `POST /alerts`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IngestSummary {
    pub status: &'static str,
    pub message: &'static str,
    pub count: usize,
}

impl IngestSummary {
    fn accepted(count: usize) -> Self {
        Self {
            status: "success",
            message: "Alerts received and processed",
            count,
        }
    }
}

/// The alert ingestion endpoint, independent of the HTTP framework.
#[derive(Clone)]
pub struct AlertIngress {
    registry: Arc<DestinationRegistry>,
    metrics: Metrics,
}

impl AlertIngress {
    pub fn new(registry: Arc<DestinationRegistry>, metrics: Metrics) -> Self {
        Self { registry, metrics }
    }

    /// Validates and parses one request, then dispatches every alert in it.
    ///
    /// Alerts are dispatched in request order; each dispatch fans out to all
    /// destinations concurrently. The batch runs in its own task, so dropping
    /// this future (a client disconnect) does not stop delivery. The call
    /// returns once every destination has had its attempt at every alert.
    /// Delivery failures do not change the result.
    ///
    /// # Arguments
    /// * `method` - The HTTP method; anything but POST is rejected before the
    ///   body is looked at.
    /// * `body` - The request body, or the error from reading it.
    pub async fn ingest<E>(
        &self,
        method: &Method,
        body: impl std::future::IntoFuture<Output = Result<Bytes, E>>,
    ) -> Result<IngestSummary, IngressError>
    where
        E: std::fmt::Display,
    {
        if *method != Method::POST {
            return Err(IngressError::MethodNotAllowed);
        }

        let body = body.await.map_err(|e| {
            warn!(error = %e, "Could not read request body");
            IngressError::BodyRead
        })?;

        let batch = parse_alerts(&body).inspect_err(|e| {
            warn!(error = %e, "Rejected alert request");
        })?;
        let count = batch.alerts.len();

        match &batch.source {
            AlertSource::Envelope { status, receiver } => {
                info!(count, status = %status, receiver = %receiver, "Received Alertmanager webhook");
            }
            AlertSource::Array => {
                info!(count, "Received alert array");
            }
        }

        self.metrics.alerts_received_total.increment(count as u64);

        let registry = self.registry.clone();
        let metrics = self.metrics.clone();
        let dispatch = tokio::spawn(async move {
            let start = Instant::now();
            for alert in batch.alerts {
                registry.dispatch(Arc::new(alert)).await;
            }
            metrics
                .processing_duration_seconds
                .record(start.elapsed().as_secs_f64());
        });
        if let Err(e) = dispatch.await {
            error!(error = %e, "Alert dispatch task failed");
        }

        Ok(IngestSummary::accepted(count))
    }
}
