//! # Hook-Keeper HTTP Service
//!
//! HTTP server for receiving webhooks and feeding them to the Hook-Keeper
//! rule engine.
//!
//! This service provides:
//! - Webhook endpoint with HMAC signature verification and queue backpressure
//! - Health check endpoint
//! - JSON and Prometheus metrics endpoints

pub mod config;
pub mod errors;
pub mod metrics;

pub use config::{EngineConfig, LoggingConfig, ServerConfig, ServiceConfig, WebhookConfig};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use metrics::ServiceMetrics;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use hook_keeper_core::{
    EventId, EventParser, RuleEngine, SignatureVerifier, WebhookDelivery, WorkerPool,
};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer,
};
use tracing::{error, info, instrument, warn};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Rule engine the workers feed
    pub engine: Arc<RuleEngine>,

    /// Bounded queue in front of the workers
    pub pool: Arc<WorkerPool>,

    pub verifier: Arc<SignatureVerifier>,

    pub parser: Arc<EventParser>,

    /// Prometheus registry for this instance
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        engine: Arc<RuleEngine>,
        pool: Arc<WorkerPool>,
    ) -> Result<Self, ServiceError> {
        let metrics = ServiceMetrics::new().map_err(ConfigError::from)?;
        let verifier = SignatureVerifier::new(config.webhooks.secret.clone());
        let parser = EventParser::new(config.webhooks.header_prefix.to_lowercase());

        Ok(Self {
            config: Arc::new(config),
            engine,
            pool,
            verifier: Arc::new(verifier),
            parser: Arc::new(parser),
            metrics,
        })
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let webhook_routes =
        Router::new().route(&state.config.webhooks.endpoint_path, post(handle_webhook));

    let health_routes = Router::new().route("/health", get(handle_health_check));

    let observability_routes = Router::new()
        .route("/metrics", get(handle_metrics))
        .route("/metrics/prometheus", get(handle_prometheus_metrics));

    let max_body_size = state.config.server.max_body_size;

    Router::new()
        .merge(webhook_routes)
        .merge(health_routes)
        .merge(observability_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(max_body_size))
                .layer(middleware::from_fn(request_logging_middleware))
                .into_inner(),
        )
        .with_state(state)
}

/// Start the worker pool and the HTTP server.
///
/// Runs until SIGINT or SIGTERM, then stops accepting connections, cancels
/// the workers and waits up to `server.shutdown_timeout_seconds` for them.
pub async fn start_server(config: ServiceConfig, engine: Arc<RuleEngine>) -> Result<(), ServiceError> {
    let token = CancellationToken::new();
    let pool = Arc::new(WorkerPool::start(
        Arc::clone(&engine),
        config.engine.queue_capacity,
        config.engine.workers,
        token.clone(),
    ));

    let address = format!("{}:{}", config.server.host, config.server.port);
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);

    let state = AppState::new(config, engine, Arc::clone(&pool))?;
    let app = create_router(state);

    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            pool.shutdown().await;
            return Err(ServiceError::BindFailed {
                address,
                message: e.to_string(),
            });
        }
    };

    info!("Starting HTTP server on {}", address);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(token.clone()))
        .await;

    if tokio::time::timeout(shutdown_timeout, pool.shutdown())
        .await
        .is_err()
    {
        warn!(
            timeout_seconds = shutdown_timeout.as_secs(),
            "Workers did not stop before the shutdown timeout"
        );
    }

    served.map_err(|e| ServiceError::ServerFailed {
        message: e.to_string(),
    })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Resolves on SIGINT, SIGTERM or cancellation of `token`, then cancels it
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
        _ = token.cancelled() => info!("Shutdown requested"),
    }

    token.cancel();
}

// ============================================================================
// Webhook Handler
// ============================================================================

/// Accept one webhook delivery.
///
/// 1. Verify the signature when a secret is configured (401); the body is not
///    parsed or logged on failure
/// 2. Normalize the delivery into an event (400)
/// 3. Queue the event without waiting (503 when full)
///
/// Rule evaluation happens later on a worker; the sender only learns whether
/// the event was accepted.
#[instrument(skip(state, headers, body), fields(event_id))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookHandlerError> {
    let header_map: HashMap<String, String> = headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_lowercase(),
                v.to_str().unwrap_or("").to_string(),
            )
        })
        .collect();

    let webhooks = &state.config.webhooks;
    let header = |name: &str| header_map.get(&name.to_lowercase()).cloned();

    let signature = header(&webhooks.signature_header);
    if !state.verifier.verify(&body, signature.as_deref()) {
        state.metrics.record_webhook("unauthorized");
        return Err(WebhookHandlerError::InvalidSignature);
    }

    let delivery = WebhookDelivery::new(
        header(&webhooks.event_header),
        header(&webhooks.delivery_header),
        body,
    )
    .with_headers(header_map);

    let event = state.parser.parse(delivery).map_err(|e| {
        state.metrics.record_webhook("bad_request");
        WebhookHandlerError::from(e)
    })?;

    let event_id = event.id.clone();
    let event_type = event.qualified_type();
    tracing::Span::current().record("event_id", event_id.as_str());

    state.pool.try_enqueue(event).map_err(|e| {
        state.metrics.record_webhook("unavailable");
        WebhookHandlerError::from(e)
    })?;

    state.metrics.record_webhook("accepted");
    info!(
        event_id = %event_id,
        event_type = %event_type,
        queue_size = state.pool.queue_size(),
        "Accepted webhook"
    );

    Ok(Json(WebhookResponse {
        status: "accepted".to_string(),
        event_id,
    }))
}

// ============================================================================
// Health and Metrics Handlers
// ============================================================================

/// Liveness check; always healthy while the process serves requests
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Engine counters as JSON
async fn handle_metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    let snapshot = state.engine.metrics();
    Json(MetricsResponse {
        events_processed: snapshot.events_processed,
        rules_evaluated: snapshot.rules_evaluated,
        actions_executed: snapshot.actions_executed,
        errors: snapshot.errors,
        avg_processing_ms: snapshot.avg_processing_ms(),
        queue_size: state.pool.queue_size(),
    })
}

/// Prometheus text exposition
#[instrument(skip_all)]
async fn handle_prometheus_metrics(State(state): State<AppState>) -> Result<Response, StatusCode> {
    state
        .metrics
        .sync(&state.engine.metrics(), state.pool.queue_size());

    let body = state.metrics.encode().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response())
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking
///
/// Reuses an inbound `x-correlation-id` or generates one, records it on the
/// span and echoes it on the response. Request bodies are never logged.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri(),
    correlation_id
))]
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());
    request.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value);
    }

    let status = response.status();

    if status.is_server_error() {
        error!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

// ============================================================================
// Response Types
// ============================================================================

/// Body of a `200` webhook response
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: String,
    pub event_id: EventId,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

/// Body of `GET /metrics`
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub events_processed: u64,
    pub rules_evaluated: u64,
    pub actions_executed: u64,
    pub errors: u64,
    pub avg_processing_ms: f64,
    pub queue_size: usize,
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
