#[path = "../helpers/mod.rs"]
mod helpers;

use alertrelay::config::DestinationConfig;
use alertrelay::core::Destination;
use alertrelay::destinations;
use alertrelay::internal_metrics::{
    ALERTS_PROCESSED_TOTAL, ALERTS_RECEIVED_TOTAL, PROCESSING_ERRORS_TOTAL,
};
use helpers::app::TestAppBuilder;
use helpers::mock_destination::CountingDestination;
use helpers::test_metrics::TestMetrics;
use reqwest::StatusCode;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn webhook(url: String) -> DestinationConfig {
    DestinationConfig {
        kind: "webhook".to_string(),
        enabled: true,
        name: "broken-webhook".to_string(),
        config: json!({ "url": url }),
    }
}

#[tokio::test]
async fn test_failing_destination_does_not_fail_the_request() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let test_metrics = TestMetrics::new();
    let counting = CountingDestination::new("counter");
    let app = TestAppBuilder::new()
        .with_destinations(vec![
            destinations::build(&webhook(server.uri())).unwrap(),
            Arc::new(counting.clone()) as Arc<dyn Destination>,
        ])
        .with_metrics(test_metrics.metrics())
        .start()
        .await
        .unwrap();

    let body = json!([
        { "status": "firing", "labels": { "alertname": "A", "severity": "critical" } },
        { "status": "firing", "labels": { "alertname": "B", "severity": "warning" } }
    ]);

    // Act
    let response = app.post_alerts(body.to_string()).await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(test_metrics.get_counter(ALERTS_RECEIVED_TOTAL), 2);
    assert_eq!(test_metrics.get_counter(PROCESSING_ERRORS_TOTAL), 2);
    assert_eq!(test_metrics.get_counter(ALERTS_PROCESSED_TOTAL), 2);
    assert_eq!(counting.count(), 2);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_hanging_destination_is_timed_out() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let test_metrics = TestMetrics::new();
    let app = TestAppBuilder::new()
        .with_destinations(vec![destinations::build(&webhook(server.uri())).unwrap()])
        .with_metrics(test_metrics.metrics())
        .with_dispatch_timeout(Duration::from_millis(200))
        .start()
        .await
        .unwrap();

    // Act
    let response = app
        .post_alerts(json!([{ "status": "firing" }]).to_string())
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(test_metrics.get_counter(PROCESSING_ERRORS_TOTAL), 1);
    assert_eq!(test_metrics.get_counter(ALERTS_PROCESSED_TOTAL), 0);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}
