//! Tests for the HTTP routes.

use super::*;
use axum::{body::Body, http::Request};
use hook_keeper_core::signature::compute_signature;
use tower::ServiceExt;

// ============================================================================
// Helpers
// ============================================================================

fn test_state(config: ServiceConfig, token: CancellationToken) -> AppState {
    let engine = Arc::new(RuleEngine::default());
    let pool = Arc::new(WorkerPool::start(Arc::clone(&engine), 4, 1, token));
    AppState::new(config, engine, pool).unwrap()
}

fn webhook_request(headers: &[(&str, &str)], body: &'static str) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/webhook");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Webhook endpoint
// ============================================================================

mod webhook_tests {
    use super::*;

    #[tokio::test]
    async fn test_valid_delivery_is_accepted() {
        let app = create_router(test_state(ServiceConfig::default(), CancellationToken::new()));

        let response = app
            .oneshot(webhook_request(
                &[
                    ("X-GitHub-Event", "push"),
                    ("X-GitHub-Delivery", "72d3162e-cc78-11e3-81ab-4c9367dc0958"),
                ],
                r#"{"repository":{"name":"r1"}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(
            body,
            serde_json::json!({
                "status": "accepted",
                "event_id": "72d3162e-cc78-11e3-81ab-4c9367dc0958"
            })
        );
    }

    /// Without a delivery header the server assigns an id
    #[tokio::test]
    async fn test_missing_delivery_id_is_generated() {
        let app = create_router(test_state(ServiceConfig::default(), CancellationToken::new()));

        let response = app
            .oneshot(webhook_request(&[("x-github-event", "ping")], "{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(!body["event_id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_event_header_is_bad_request() {
        let app = create_router(test_state(ServiceConfig::default(), CancellationToken::new()));

        let response = app
            .oneshot(webhook_request(&[], r#"{"repository":{"name":"r1"}}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["status"], 400);
    }

    #[tokio::test]
    async fn test_non_json_body_is_bad_request() {
        let app = create_router(test_state(ServiceConfig::default(), CancellationToken::new()));

        let response = app
            .oneshot(webhook_request(&[("x-github-event", "push")], "not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_wrong_signature_is_unauthorized() {
        let mut config = ServiceConfig::default();
        config.webhooks.secret = Some("s3cr3t".to_string());
        let state = test_state(config, CancellationToken::new());
        let app = create_router(state.clone());
        let signature = compute_signature(b"s3cr3t", b"{\"other\":true}");

        let response = app
            .oneshot(webhook_request(
                &[
                    ("x-github-event", "push"),
                    ("x-hub-signature-256", signature.as_str()),
                ],
                "{}",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(state.pool.queue_size(), 0);
    }

    #[tokio::test]
    async fn test_missing_signature_is_unauthorized_when_secret_set() {
        let mut config = ServiceConfig::default();
        config.webhooks.secret = Some("s3cr3t".to_string());
        let app = create_router(test_state(config, CancellationToken::new()));

        let response = app
            .oneshot(webhook_request(&[("x-github-event", "push")], "{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_correct_signature_is_accepted() {
        let mut config = ServiceConfig::default();
        config.webhooks.secret = Some("s3cr3t".to_string());
        let app = create_router(test_state(config, CancellationToken::new()));
        let signature = compute_signature(b"s3cr3t", b"{}");

        let response = app
            .oneshot(webhook_request(
                &[
                    ("x-github-event", "push"),
                    ("X-Hub-Signature-256", signature.as_str()),
                ],
                "{}",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    /// A stopped pool rejects with 503 and a Retry-After hint
    #[tokio::test]
    async fn test_closed_queue_is_unavailable() {
        let token = CancellationToken::new();
        let state = test_state(ServiceConfig::default(), token.clone());
        token.cancel();
        let app = create_router(state);

        let response = app
            .oneshot(webhook_request(&[("x-github-event", "push")], "{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().contains_key("retry-after"));
    }

    #[tokio::test]
    async fn test_custom_endpoint_and_event_header() {
        let mut config = ServiceConfig::default();
        config.webhooks.endpoint_path = "/hooks/github".to_string();
        config.webhooks.event_header = "X-Event".to_string();
        let app = create_router(test_state(config, CancellationToken::new()));

        let request = Request::builder()
            .method("POST")
            .uri("/hooks/github")
            .header("x-event", "push")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let mut config = ServiceConfig::default();
        config.server.max_body_size = 8;
        let app = create_router(test_state(config, CancellationToken::new()));

        let response = app
            .oneshot(webhook_request(
                &[("x-github-event", "push")],
                r#"{"padding":"well past eight bytes"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    /// A small body limit still lets bodies under it through the middleware stack
    #[tokio::test]
    async fn test_body_within_limit_is_accepted() {
        let mut config = ServiceConfig::default();
        config.server.max_body_size = 64;
        let app = create_router(test_state(config, CancellationToken::new()));

        let response = app
            .oneshot(webhook_request(
                &[("x-github-event", "push"), ("x-correlation-id", "limit-check")],
                r#"{"ref":"refs/heads/main"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-correlation-id"], "limit-check");
    }
}

// ============================================================================
// Health and metrics
// ============================================================================

mod observability_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_reports_healthy() {
        let app = create_router(test_state(ServiceConfig::default(), CancellationToken::new()));

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert!(chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_metrics_reports_all_counters() {
        let app = create_router(test_state(ServiceConfig::default(), CancellationToken::new()));

        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        for key in [
            "events_processed",
            "rules_evaluated",
            "actions_executed",
            "errors",
            "avg_processing_ms",
            "queue_size",
        ] {
            assert!(body.get(key).is_some(), "missing {key} in {body}");
        }
        assert_eq!(body["events_processed"], 0);
    }

    #[tokio::test]
    async fn test_prometheus_exposition() {
        let app = create_router(test_state(ServiceConfig::default(), CancellationToken::new()));

        let response = app
            .oneshot(
                Request::get("/metrics/prometheus")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("hook_keeper_events_processed_total"));
    }

    #[tokio::test]
    async fn test_correlation_id_is_echoed() {
        let app = create_router(test_state(ServiceConfig::default(), CancellationToken::new()));

        let response = app
            .oneshot(
                Request::get("/health")
                    .header("x-correlation-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["x-correlation-id"], "abc-123");
    }
}
