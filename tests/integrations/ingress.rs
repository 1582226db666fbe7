#[path = "../helpers/mod.rs"]
mod helpers;

use alertrelay::core::Destination;
use alertrelay::internal_metrics::{ALERTS_PROCESSED_TOTAL, ALERTS_RECEIVED_TOTAL, PROCESSING_DURATION_SECONDS};
use futures::future::join_all;
use helpers::app::TestAppBuilder;
use helpers::mock_destination::{CountingDestination, SlowDestination};
use helpers::test_metrics::TestMetrics;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_bare_array_is_accepted_and_dispatched() {
    // Arrange
    let destination = CountingDestination::new("counter");
    let test_metrics = TestMetrics::new();
    let app = TestAppBuilder::new()
        .with_destinations(vec![Arc::new(destination.clone()) as Arc<dyn Destination>])
        .with_metrics(test_metrics.metrics())
        .start()
        .await
        .unwrap();

    let body = json!([
        { "status": "firing", "labels": { "alertname": "HighCPU", "severity": "critical" }, "annotations": {} },
        { "status": "resolved", "labels": { "alertname": "DiskFull" }, "annotations": { "summary": "ok" } }
    ]);

    // Act
    let response = app.post_alerts(body.to_string()).await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let summary: Value = response.json().await.unwrap();
    assert_eq!(
        summary,
        json!({ "status": "success", "message": "Alerts received and processed", "count": 2 })
    );
    assert_eq!(destination.received(), vec!["HighCPU", "DiskFull"]);
    assert_eq!(test_metrics.get_counter(ALERTS_RECEIVED_TOTAL), 2);
    assert_eq!(test_metrics.get_counter(ALERTS_PROCESSED_TOTAL), 2);
    assert_eq!(test_metrics.histogram_count(PROCESSING_DURATION_SECONDS), 1);

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn test_alertmanager_envelope_is_accepted() {
    // Arrange
    let destination = CountingDestination::new("counter");
    let app = TestAppBuilder::new()
        .with_destinations(vec![Arc::new(destination.clone()) as Arc<dyn Destination>])
        .start()
        .await
        .unwrap();

    let body = json!({
        "version": "4",
        "groupKey": "{}:{alertname=\"HighCPU\"}",
        "truncatedAlerts": 0,
        "status": "firing",
        "receiver": "alertrelay",
        "groupLabels": { "alertname": "HighCPU" },
        "commonLabels": { "alertname": "HighCPU" },
        "commonAnnotations": {},
        "externalURL": "http://alertmanager:9093",
        "alerts": [
            {
                "status": "firing",
                "labels": { "alertname": "HighCPU", "instance": "web-1" },
                "annotations": { "summary": "CPU above 90%" },
                "startsAt": "2024-01-01T00:00:00Z",
                "endsAt": "0001-01-01T00:00:00Z",
                "generatorURL": "http://prometheus/graph",
                "fingerprint": "abc"
            }
        ]
    });

    // Act
    let response = app.post_alerts(body.to_string()).await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let summary: Value = response.json().await.unwrap();
    assert_eq!(summary["count"], 1);
    assert_eq!(destination.count(), 1);

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn test_malformed_and_empty_bodies_are_rejected() {
    // Arrange
    let destination = CountingDestination::new("counter");
    let test_metrics = TestMetrics::new();
    let app = TestAppBuilder::new()
        .with_destinations(vec![Arc::new(destination.clone()) as Arc<dyn Destination>])
        .with_metrics(test_metrics.metrics())
        .start()
        .await
        .unwrap();

    let cases = [
        ("invalid json", "invalid JSON format"),
        ("{\"status\":\"firing\",\"alerts\":[]}", "invalid JSON format"),
        ("[]", "no alerts in request"),
    ];

    for (body, expected_error) in cases {
        // Act
        let response = app.post_alerts(body).await;

        // Assert
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        let error: Value = response.json().await.unwrap();
        assert_eq!(error, json!({ "status": "error", "error": expected_error }));
    }

    assert_eq!(destination.count(), 0);
    assert_eq!(test_metrics.get_counter(ALERTS_RECEIVED_TOTAL), 0);

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn test_non_post_methods_are_rejected() {
    // Arrange
    let destination = CountingDestination::new("counter");
    let app = TestAppBuilder::new()
        .with_destinations(vec![Arc::new(destination.clone()) as Arc<dyn Destination>])
        .start()
        .await
        .unwrap();

    // Act
    let get = app.client.get(app.url("/alerts")).send().await.unwrap();
    let put = app
        .client
        .put(app.url("/alerts"))
        .body("[{\"status\":\"firing\"}]")
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(get.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(put.status(), StatusCode::METHOD_NOT_ALLOWED);
    let error: Value = put.json().await.unwrap();
    assert_eq!(error["status"], "error");
    assert_eq!(destination.count(), 0);

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn test_oversized_body_is_a_bad_request() {
    // Arrange
    let destination = CountingDestination::new("counter");
    let mut builder = TestAppBuilder::new()
        .with_destinations(vec![Arc::new(destination.clone()) as Arc<dyn Destination>]);
    builder.config.server.max_body_bytes = 64;
    let app = builder.start().await.unwrap();

    let body = json!([{ "status": "firing", "labels": { "alertname": "x".repeat(200) } }]);

    // Act
    let response = app.post_alerts(body.to_string()).await;

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(destination.count(), 0);

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn test_health_and_landing_page() {
    // Arrange
    let app = TestAppBuilder::new().start().await.unwrap();

    // Act
    let health = app.client.get(app.url("/health")).send().await.unwrap();
    let root = app.client.get(app.url("/")).send().await.unwrap();

    // Assert
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(health.json::<Value>().await.unwrap(), json!({ "status": "healthy" }));
    assert_eq!(root.status(), StatusCode::OK);
    let page = root.text().await.unwrap();
    assert!(page.contains("POST /alerts"));

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_requests_are_all_counted() {
    // Arrange
    let destination = CountingDestination::new("counter");
    let test_metrics = TestMetrics::new();
    let app = TestAppBuilder::new()
        .with_destinations(vec![Arc::new(destination.clone()) as Arc<dyn Destination>])
        .with_metrics(test_metrics.metrics())
        .start()
        .await
        .unwrap();

    let body = json!([
        { "status": "firing", "labels": { "alertname": "A" } },
        { "status": "firing", "labels": { "alertname": "B" } }
    ])
    .to_string();

    // Act
    let responses = join_all((0..10).map(|_| app.post_alerts(body.clone()))).await;

    // Assert
    assert!(responses.iter().all(|r| r.status() == StatusCode::OK));
    assert_eq!(test_metrics.get_counter(ALERTS_RECEIVED_TOTAL), 20);
    assert_eq!(test_metrics.get_counter(ALERTS_PROCESSED_TOTAL), 20);
    assert_eq!(destination.count(), 20);

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn test_client_disconnect_does_not_stop_dispatch() {
    // Arrange
    let slow = SlowDestination::new(Duration::from_millis(100));
    let app = TestAppBuilder::new()
        .with_destinations(vec![Arc::new(slow.clone()) as Arc<dyn Destination>])
        .start()
        .await
        .unwrap();
    let impatient = reqwest::Client::builder()
        .timeout(Duration::from_millis(150))
        .build()
        .unwrap();
    let body = json!([
        { "status": "firing", "labels": { "alertname": "A" } },
        { "status": "firing", "labels": { "alertname": "B" } },
        { "status": "firing", "labels": { "alertname": "C" } },
        { "status": "firing", "labels": { "alertname": "D" } }
    ]);

    // Act
    let result = impatient
        .post(app.url("/alerts"))
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await;

    // Assert
    assert!(result.is_err(), "client should give up before the batch finishes");
    for _ in 0..60 {
        if slow.completed.load(Ordering::SeqCst) == 4 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(slow.completed.load(Ordering::SeqCst), 4);

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}
