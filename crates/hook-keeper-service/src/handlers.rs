//! Action handlers shipped with the service.
//!
//! Neither handler talks to an external system. `notification` resolves the
//! target endpoint and logs the rendered message; `log` only logs.

use async_trait::async_trait;
use hook_keeper_core::dispatcher::{ActionError, ActionHandler};
use hook_keeper_core::rules::{Action, Parameters};
use hook_keeper_core::template;
use hook_keeper_core::{Event, GlobalConfig};
use std::collections::HashMap;
use tracing::info;

/// Notification type used when an action does not name one
pub const DEFAULT_NOTIFICATION_TYPE: &str = "default";

/// Sends a rendered `message` to the endpoint configured for its `type`
#[derive(Debug, Default)]
pub struct NotificationHandler {
    endpoints: HashMap<String, String>,
    variables: HashMap<String, String>,
}

impl NotificationHandler {
    pub fn new(global: &GlobalConfig) -> Self {
        Self {
            endpoints: global.notification_urls.clone(),
            variables: global.template_variables(),
        }
    }

    /// Add or replace the endpoint for `notification_type`
    pub fn register_endpoint(&mut self, notification_type: impl Into<String>, url: impl Into<String>) {
        self.endpoints.insert(notification_type.into(), url.into());
    }
}

#[async_trait]
impl ActionHandler for NotificationHandler {
    async fn execute(&self, event: &Event, action: &Action) -> Result<(), ActionError> {
        let notification_type = action
            .parameter_str("type")
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_NOTIFICATION_TYPE);

        let message = action
            .parameter_str("message")
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ActionError::invalid_parameters("message parameter is required"))?;
        let message = template::render(message, event, &self.variables);

        let endpoint = self.endpoints.get(notification_type).ok_or_else(|| {
            anyhow::anyhow!(
                "no webhook configured for notification type: {}",
                notification_type
            )
        })?;

        info!(
            event_id = %event.id,
            notification_type = %notification_type,
            endpoint = %endpoint,
            message = %message,
            "Sent notification"
        );
        Ok(())
    }

    fn validate_parameters(&self, parameters: &Parameters) -> Result<(), ActionError> {
        if !parameters.contains_key("message") {
            return Err(ActionError::invalid_parameters("message parameter is required"));
        }
        Ok(())
    }
}

/// Logs a rendered `message`, or the event summary when none is given
#[derive(Debug, Default)]
pub struct LogHandler {
    variables: HashMap<String, String>,
}

impl LogHandler {
    pub fn new(global: &GlobalConfig) -> Self {
        Self {
            variables: global.template_variables(),
        }
    }
}

#[async_trait]
impl ActionHandler for LogHandler {
    async fn execute(&self, event: &Event, action: &Action) -> Result<(), ActionError> {
        let message = action
            .parameter_str("message")
            .map(|m| template::render(m, event, &self.variables))
            .unwrap_or_else(|| format!("{} event received", event.qualified_type()));

        info!(
            event_id = %event.id,
            event_type = %event.event_type,
            repository = %event.repository_full_name(),
            sender = %event.sender_login(),
            "{}",
            message
        );
        Ok(())
    }

    fn validate_parameters(&self, _parameters: &Parameters) -> Result<(), ActionError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
