//! Action dispatch to registered handlers.
//!
//! Handlers are looked up by action type in a [`HandlerRegistry`] that is
//! filled at startup and read-only afterwards. Synchronous actions run inside
//! the worker's processing task and report their error to the caller.
//! Asynchronous actions are detached onto their own task; their errors are
//! logged and counted but never reported back.

use crate::event::Event;
use crate::metrics::Metrics;
use crate::parse_duration;
use crate::rules::{Action, Parameters, Rule};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Capability that performs the effect of one action type
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Perform the action for `event`
    async fn execute(&self, event: &Event, action: &Action) -> Result<(), ActionError>;

    /// Check the parameters of an action before its rule is accepted
    fn validate_parameters(&self, parameters: &Parameters) -> Result<(), ActionError>;
}

/// Errors produced while executing a single action
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("no handler registered for action type: {action_type}")]
    NoHandler { action_type: String },

    #[error("{message}")]
    InvalidParameters { message: String },

    #[error("action {action_type} timed out after {timeout:?}")]
    Timeout {
        action_type: String,
        timeout: Duration,
    },

    #[error("failed to execute action {action_type}: {source}")]
    Failed {
        action_type: String,
        #[source]
        source: Box<ActionError>,
    },

    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

impl ActionError {
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            message: message.into(),
        }
    }
}

// ============================================================================
// Handler Registry
// ============================================================================

/// Mapping from action type to handler
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `action_type`.
    ///
    /// Returns `false` and leaves the registry untouched if the type is taken.
    pub fn register(&mut self, action_type: impl Into<String>, handler: Arc<dyn ActionHandler>) -> bool {
        let action_type = action_type.into();
        if self.handlers.contains_key(&action_type) {
            return false;
        }
        info!(action_type = %action_type, "Registered action handler");
        self.handlers.insert(action_type, handler);
        true
    }

    pub fn get(&self, action_type: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(action_type).cloned()
    }

    /// Registered action types, sorted
    pub fn action_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("action_types", &self.action_types())
            .finish()
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Executes the actions of matched rules
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    registry: Arc<HandlerRegistry>,
    metrics: Arc<Metrics>,
    default_timeout: Option<Duration>,
}

impl ActionDispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, metrics: Arc<Metrics>) -> Self {
        Self {
            registry,
            metrics,
            default_timeout: None,
        }
    }

    /// Timeout applied to actions that do not set their own
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Run the actions of `rule` in list order.
    ///
    /// Stops at the first failing synchronous action and returns its error.
    /// Asynchronous actions are spawned and never fail this call.
    pub async fn execute_rule_actions(
        &self,
        rule: &Rule,
        event: &Arc<Event>,
    ) -> Result<(), ActionError> {
        for action in &rule.actions {
            self.metrics.record_action_executed();
            let timeout = self.resolve_timeout(action);

            if action.run_async {
                self.spawn_detached(rule.id.clone(), action.clone(), Arc::clone(event), timeout);
                continue;
            }

            execute_action(&self.registry, action, event, timeout)
                .await
                .map_err(|source| ActionError::Failed {
                    action_type: action.action_type.clone(),
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }

    fn spawn_detached(
        &self,
        rule_id: String,
        action: Action,
        event: Arc<Event>,
        timeout: Option<Duration>,
    ) {
        let registry = Arc::clone(&self.registry);
        let metrics = Arc::clone(&self.metrics);

        tokio::spawn(async move {
            if let Err(e) = execute_action(&registry, &action, &event, timeout).await {
                metrics.record_error();
                error!(
                    rule_id = %rule_id,
                    action_type = %action.action_type,
                    event_id = %event.id,
                    error = %e,
                    "Failed to execute async action"
                );
            }
        });
    }

    fn resolve_timeout(&self, action: &Action) -> Option<Duration> {
        match action.timeout.as_deref() {
            None | Some("") => self.default_timeout,
            Some(raw) => match parse_duration(raw) {
                Some(timeout) if !timeout.is_zero() => Some(timeout),
                _ => {
                    warn!(
                        action_type = %action.action_type,
                        timeout = %raw,
                        "Ignoring invalid action timeout"
                    );
                    None
                }
            },
        }
    }
}

/// Look up the handler for `action` and run it, bounded by `timeout`
async fn execute_action(
    registry: &HandlerRegistry,
    action: &Action,
    event: &Event,
    timeout: Option<Duration>,
) -> Result<(), ActionError> {
    let handler = registry
        .get(&action.action_type)
        .ok_or_else(|| ActionError::NoHandler {
            action_type: action.action_type.clone(),
        })?;

    debug!(
        action_type = %action.action_type,
        event_id = %event.id,
        "Executing action"
    );

    match timeout {
        Some(limit) => tokio::time::timeout(limit, handler.execute(event, action))
            .await
            .map_err(|_| ActionError::Timeout {
                action_type: action.action_type.clone(),
                timeout: limit,
            })?,
        None => handler.execute(event, action).await,
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
