//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use hook_keeper_core::{EnqueueError, ParseError};
use tracing::warn;

/// Webhook rejections with HTTP status code mapping
///
/// - `400 Bad Request`: missing event header or a body that is not a JSON
///   object. Permanent; the sender should not retry.
/// - `401 Unauthorized`: signature missing or wrong while a secret is
///   configured. The body is neither parsed nor logged.
/// - `503 Service Unavailable`: the event queue is full or shutting down.
///   Transient; a `Retry-After` header is included.
///
/// No event is created for any of these.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] ParseError),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Service unavailable: {0}")]
    Unavailable(#[from] EnqueueError),
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let (status, message, retry_after) = match self {
            Self::InvalidRequest(ref e) => {
                warn!(error = %e, "Rejected webhook request");
                (StatusCode::BAD_REQUEST, self.to_string(), None)
            }
            Self::InvalidSignature => {
                warn!("Rejected webhook with invalid signature");
                (StatusCode::UNAUTHORIZED, self.to_string(), None)
            }
            Self::Unavailable(ref e) => {
                warn!(error = %e, "Rejected webhook, queue unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string(), Some(1))
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut response = (status, Json(body)).into_response();

        if let Some(retry_seconds) = retry_after {
            if let Ok(header_value) = retry_seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", header_value);
            }
        }

        response
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl ServiceError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed { .. } => 2,
            Self::Configuration(_) => 3,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Failed to initialize metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}
