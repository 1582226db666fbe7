//! # Ingress Server
//!
//! The `axum` server that receives alerts. It exposes:
//!
//! - `POST /alerts` - the Alertmanager webhook target (any other method gets 405)
//! - `GET /health` - a static liveness response
//! - `GET /` - a short HTML page describing the endpoints

use crate::ingress::AlertIngress;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::json;
use std::future::Future;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, trace};

#[derive(Clone)]
struct IngressState {
    ingress: AlertIngress,
    max_body_bytes: usize,
}

/// Builds the ingress router.
///
/// # Arguments
/// * `ingress` - Handles parsed alert batches.
/// * `max_body_bytes` - Larger bodies fail to read and are answered with 400.
pub fn router(ingress: AlertIngress, max_body_bytes: usize) -> Router {
    let state = IngressState {
        ingress,
        max_body_bytes,
    };

    Router::new()
        .route("/alerts", any(alerts_handler))
        .route("/health", get(health_handler))
        .route("/", get(root_handler))
        .with_state(state)
}

async fn alerts_handler(State(state): State<IngressState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, state.max_body_bytes);

    match state.ingress.ingest(&parts.method, body).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Static liveness check, also mounted on the metrics server.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

async fn root_handler() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

const LANDING_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>alertrelay</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 40px; background-color: #f5f5f5; }
        .container { max-width: 800px; margin: 0 auto; background: white; padding: 30px; border-radius: 8px; }
        h1 { color: #e6522c; }
        .endpoint { background: #f8f8f8; padding: 15px; margin: 10px 0; border-left: 4px solid #e6522c; }
    </style>
</head>
<body>
    <div class="container">
        <h1>alertrelay</h1>
        <p>Routes Prometheus Alertmanager notifications to chat, email, incident and webhook destinations.</p>
        <div class="endpoint"><h3>POST /alerts</h3><p>Alertmanager webhook envelope or a JSON array of alerts</p></div>
        <div class="endpoint"><h3>GET /health</h3><p>Health check</p></div>
        <div class="endpoint"><h3>GET /metrics</h3><p>Prometheus metrics, served on the metrics port</p></div>
        <h2>Destinations</h2>
        <ul>
            <li><strong>basic</strong> - log the alert</li>
            <li><strong>slack</strong> - Slack incoming webhook</li>
            <li><strong>email</strong> - SMTP</li>
            <li><strong>webhook</strong> - generic HTTP endpoint</li>
            <li><strong>pagerduty</strong> - PagerDuty Events API v2</li>
        </ul>
    </div>
</body>
</html>
"#;

/// Serves the ingress router on an already-bound listener.
pub struct IngressServer {
    listener: TcpListener,
    router: Router,
    shutdown_rx: watch::Receiver<bool>,
}

impl IngressServer {
    pub fn new(listener: TcpListener, router: Router, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            listener,
            router,
            shutdown_rx,
        }
    }

    /// Returns a future that serves requests until the shutdown signal flips
    /// to `true`. In-flight requests are allowed to finish.
    pub fn run(self) -> impl Future<Output = ()> {
        let Self {
            listener,
            router,
            mut shutdown_rx,
        } = self;

        async move {
            let shutdown = async move {
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
                trace!("Ingress server received shutdown signal.");
            };
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %e, "Ingress server error");
            }
            trace!("Ingress server task finished.");
        }
    }
}
