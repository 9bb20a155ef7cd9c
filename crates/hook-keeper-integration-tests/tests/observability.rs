//! Integration tests for the health and metrics endpoints

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{
    engine_with_handler, github_delivery, json_body, rule_for, wait_until, RecordingHandler, TestApp,
};
use hook_keeper_api::ServiceConfig;
use hook_keeper_core::RuleEngine;
use std::sync::Arc;

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Verify that the health endpoint reports healthy with a timestamp
#[tokio::test]
async fn test_health_endpoint_response_structure() {
    // Arrange
    let app = TestApp::start(ServiceConfig::default(), RuleEngine::default(), 10, 1);

    // Act
    let response = app.send(get("/health")).await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
}

/// Verify that metrics start at zero
#[tokio::test]
async fn test_metrics_on_idle_service() {
    // Arrange
    let app = TestApp::start(ServiceConfig::default(), RuleEngine::default(), 10, 1);

    // Act
    let response = app.send(get("/metrics")).await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["events_processed"], 0);
    assert_eq!(body["rules_evaluated"], 0);
    assert_eq!(body["actions_executed"], 0);
    assert_eq!(body["errors"], 0);
    assert_eq!(body["avg_processing_ms"], 0.0);
    assert_eq!(body["queue_size"], 0);
}

/// Verify that processed deliveries show up in both metrics formats
#[tokio::test]
async fn test_metrics_reflect_processed_events() {
    // Arrange
    let recorder = RecordingHandler::new();
    let engine = engine_with_handler("record", Arc::new(recorder.clone()));
    engine.add_rule(rule_for("push", "push", "record")).unwrap();
    engine.add_rule(rule_for("issues", "issues.opened", "record")).unwrap();
    let app = TestApp::start(ServiceConfig::default(), engine, 10, 2);

    // Act
    for _ in 0..3 {
        let response = app.send(github_delivery("push", "{}")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert!(wait_until(|| app.engine.metrics().events_processed == 3).await);

    let json = json_body(app.send(get("/metrics")).await).await;
    let prometheus = app.send(get("/metrics/prometheus")).await;

    // Assert
    assert_eq!(json["events_processed"], 3);
    assert_eq!(json["rules_evaluated"], 6);
    assert_eq!(json["actions_executed"], 3);
    assert_eq!(json["errors"], 0);
    assert_eq!(recorder.call_count(), 3);

    assert_eq!(prometheus.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(prometheus.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("hook_keeper_events_processed_total 3"));
    assert!(text.contains("hook_keeper_webhook_requests_total{outcome=\"accepted\"} 3"));
}
