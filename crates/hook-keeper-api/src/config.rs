//! Configuration types for the HTTP service

use crate::errors::ConfigError;
use hook_keeper_core::parser::DEFAULT_HEADER_PREFIX;
use hook_keeper_core::worker::{DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Webhook intake settings
    pub webhooks: WebhookConfig,

    /// Queue, worker and rule settings
    pub engine: EngineConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Reject settings the service cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let path = &self.webhooks.endpoint_path;
        if path.is_empty() || !path.starts_with('/') {
            return Err(ConfigError::Invalid {
                message: format!("webhooks.endpoint_path must start with '/': {:?}", path),
            });
        }

        for (key, value) in [
            ("webhooks.event_header", &self.webhooks.event_header),
            ("webhooks.delivery_header", &self.webhooks.delivery_header),
            ("webhooks.signature_header", &self.webhooks.signature_header),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing {
                    key: key.to_string(),
                });
            }
        }

        if self.engine.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                message: "engine.queue_capacity must be greater than zero".to_string(),
            });
        }
        if self.engine.workers == 0 {
            return Err(ConfigError::Invalid {
                message: "engine.workers must be greater than zero".to_string(),
            });
        }
        if self.server.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Time allowed for in-flight work once shutdown starts
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Webhook intake configuration.
///
/// Header names are matched case-insensitively.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Webhook endpoint path
    pub endpoint_path: String,

    /// Header carrying the event type; required on every delivery
    pub event_header: String,

    /// Header carrying the delivery id; optional on deliveries
    pub delivery_header: String,

    /// Header carrying `sha256=<hex>`
    pub signature_header: String,

    /// Headers with this prefix are kept on the event
    pub header_prefix: String,

    /// Shared HMAC secret; signature checks are skipped when unset
    pub secret: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/webhook".to_string(),
            event_header: "x-github-event".to_string(),
            delivery_header: "x-github-delivery".to_string(),
            signature_header: "x-hub-signature-256".to_string(),
            header_prefix: DEFAULT_HEADER_PREFIX.to_string(),
            secret: None,
        }
    }
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("endpoint_path", &self.endpoint_path)
            .field("event_header", &self.event_header)
            .field("delivery_header", &self.delivery_header)
            .field("signature_header", &self.signature_header)
            .field("header_prefix", &self.header_prefix)
            .field(
                "secret",
                if self.secret.is_some() {
                    &"<REDACTED>"
                } else {
                    &"None"
                },
            )
            .finish()
    }
}

/// Queue and worker sizing plus the rule source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Events buffered ahead of the workers
    pub queue_capacity: usize,

    /// Concurrent workers
    pub workers: usize,

    /// Rule file or directory of rule files
    pub rules_path: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            workers: DEFAULT_WORKERS,
            rules_path: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
