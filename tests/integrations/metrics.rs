#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::app::TestAppBuilder;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;

// Installs the global Prometheus recorder, so this binary holds a single test.
#[tokio::test]
async fn test_metrics_endpoint_exposes_relay_metrics() {
    // Arrange
    let app = TestAppBuilder::new().with_prometheus().start().await.unwrap();
    let metrics_url = format!("http://{}/metrics", app.metrics_addr());

    let body = json!([
        { "status": "firing", "labels": { "alertname": "HighCPU", "severity": "critical" } }
    ]);
    let response = app.post_alerts(body.to_string()).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Act
    let response = app.client.get(&metrics_url).send().await.unwrap();

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let exposition = response.text().await.unwrap();
    assert!(exposition.contains("alerts_received_total 1"), "{}", exposition);
    assert!(exposition.contains("alerts_processed_total 1"), "{}", exposition);
    assert!(exposition.contains("processing_duration_seconds_bucket"), "{}", exposition);

    let health = app
        .client
        .get(format!("http://{}/health", app.metrics_addr()))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}
