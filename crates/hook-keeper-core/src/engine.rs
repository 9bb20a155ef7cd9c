//! Rule evaluation and per-event processing.
//!
//! The active rule set lives behind a read/write lock as an immutable
//! `Arc<Vec<Rule>>`. Event processing clones the `Arc` under the read lock
//! and evaluates without holding any lock; writers swap in a new list.
//!
//! Rules are evaluated in registration order. `priority` is stored and
//! logged but does not reorder evaluation.

use crate::dispatcher::{ActionDispatcher, ActionError, ActionHandler, HandlerRegistry};
use crate::event::Event;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::rules::{Condition, ConditionType, ConditionValue, Operator, Rule, RuleValidationError};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Errors raised while configuring the engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("handler for action type {action_type} already registered")]
    DuplicateHandler { action_type: String },

    #[error("invalid rule: {0}")]
    InvalidRule(#[from] RuleValidationError),

    #[error("duplicate rule ID: {rule_id}")]
    DuplicateRuleId { rule_id: String },

    #[error("invalid rule: ({rule_id}) action[{index}] parameter validation failed: {source}")]
    InvalidParameters {
        rule_id: String,
        index: usize,
        source: ActionError,
    },
}

/// Outcome of processing one event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingReport {
    /// Enabled rules that were evaluated
    pub rules_evaluated: usize,
    /// Ids of the rules whose conditions all matched, in evaluation order
    pub matched_rules: Vec<String>,
    /// Ids of matched rules whose synchronous actions failed
    pub failed_rules: Vec<String>,
}

/// Holds the active rules and the handler registry
#[derive(Debug)]
pub struct RuleEngine {
    rules: RwLock<Arc<Vec<Rule>>>,
    registry: Arc<HandlerRegistry>,
    metrics: Arc<Metrics>,
    default_timeout: Option<Duration>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(Arc::new(Metrics::new()))
    }
}

impl RuleEngine {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            rules: RwLock::new(Arc::new(Vec::new())),
            registry: Arc::new(HandlerRegistry::new()),
            metrics,
            default_timeout: None,
        }
    }

    /// Timeout for actions that do not declare one
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Register the handler for `action_type`.
    ///
    /// Handlers are registered at startup, before the engine is shared.
    pub fn register_handler(
        &mut self,
        action_type: impl Into<String>,
        handler: Arc<dyn ActionHandler>,
    ) -> Result<(), EngineError> {
        let action_type = action_type.into();
        if !Arc::make_mut(&mut self.registry).register(action_type.clone(), handler) {
            return Err(EngineError::DuplicateHandler { action_type });
        }
        Ok(())
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // ------------------------------------------------------------------------
    // Rule set management
    // ------------------------------------------------------------------------

    /// Validate and append a rule
    pub fn add_rule(&self, rule: Rule) -> Result<(), EngineError> {
        self.validate_rule(&rule)?;

        let mut guard = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        if guard.iter().any(|existing| existing.id == rule.id) {
            return Err(EngineError::DuplicateRuleId { rule_id: rule.id });
        }

        info!(
            rule_id = %rule.id,
            rule_name = %rule.name,
            priority = rule.priority,
            "Added rule"
        );
        Arc::make_mut(&mut *guard).push(rule);
        Ok(())
    }

    /// Replace the whole rule set; nothing changes if any rule is invalid
    pub fn replace_rules(&self, rules: Vec<Rule>) -> Result<(), EngineError> {
        {
            let mut seen = HashSet::new();
            for rule in &rules {
                self.validate_rule(rule)?;
                if !seen.insert(rule.id.as_str()) {
                    return Err(EngineError::DuplicateRuleId {
                        rule_id: rule.id.clone(),
                    });
                }
            }
        }

        let count = rules.len();
        *self.rules.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(rules);
        info!(rule_count = count, "Replaced rule set");
        Ok(())
    }

    /// Remove the rule with `rule_id`, returning whether it existed
    pub fn remove_rule(&self, rule_id: &str) -> bool {
        let mut guard = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        let Some(position) = guard.iter().position(|r| r.id == rule_id) else {
            return false;
        };
        Arc::make_mut(&mut *guard).remove(position);
        info!(rule_id = %rule_id, "Removed rule");
        true
    }

    /// Current rule set
    pub fn rules(&self) -> Arc<Vec<Rule>> {
        Arc::clone(&*self.rules.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn validate_rule(&self, rule: &Rule) -> Result<(), EngineError> {
        rule.validate()?;

        for (index, action) in rule.actions.iter().enumerate() {
            let (Some(handler), Some(parameters)) =
                (self.registry.get(&action.action_type), action.parameters.as_ref())
            else {
                continue;
            };
            handler
                .validate_parameters(parameters)
                .map_err(|source| EngineError::InvalidParameters {
                    rule_id: rule.id.clone(),
                    index,
                    source,
                })?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------------

    /// Enabled rules whose conditions all match `event`, without running actions
    pub fn matching_rules(&self, event: &Event) -> Vec<Rule> {
        self.rules()
            .iter()
            .filter(|rule| rule.enabled && evaluate_rule(rule, event))
            .cloned()
            .collect()
    }

    /// Evaluate every enabled rule against `event` and dispatch the actions
    /// of each rule that matches.
    ///
    /// A failing rule is logged and counted; the remaining matched rules
    /// still run.
    ///
    /// # Example
    ///
    /// ```rust
    /// use bytes::Bytes;
    /// use hook_keeper_core::{
    ///     Action, Condition, ConditionType, EventParser, Operator, Rule, RuleEngine, WebhookDelivery,
    /// };
    /// use std::sync::Arc;
    ///
    /// # tokio_test::block_on(async {
    /// let engine = RuleEngine::default();
    /// engine
    ///     .add_rule(Rule {
    ///         id: "on-push".to_string(),
    ///         name: "On push".to_string(),
    ///         enabled: true,
    ///         conditions: vec![Condition::new(ConditionType::EventType, Operator::Equals, "push")],
    ///         actions: vec![Action::new("log")],
    ///         ..Rule::default()
    ///     })
    ///     .unwrap();
    ///
    /// let event = EventParser::default()
    ///     .parse(WebhookDelivery::new(Some("push".to_string()), None, Bytes::from_static(b"{}")))
    ///     .unwrap();
    /// let report = engine.process_event(Arc::new(event)).await;
    ///
    /// assert_eq!(report.matched_rules, vec!["on-push".to_string()]);
    /// // No `log` handler is registered, so the rule fails at dispatch
    /// assert_eq!(report.failed_rules, vec!["on-push".to_string()]);
    /// # });
    /// ```
    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn process_event(&self, event: Arc<Event>) -> ProcessingReport {
        let started = Instant::now();
        info!(action = %event.action, "Processing event");

        let rules = self.rules();
        let mut report = ProcessingReport::default();
        let mut matched = Vec::new();

        for rule in rules.iter().filter(|rule| rule.enabled) {
            self.metrics.record_rule_evaluated();
            report.rules_evaluated += 1;

            if evaluate_rule(rule, &event) {
                debug!(rule_id = %rule.id, rule_name = %rule.name, "Rule matched");
                report.matched_rules.push(rule.id.clone());
                matched.push(rule);
            }
        }

        let dispatcher = ActionDispatcher::new(Arc::clone(&self.registry), Arc::clone(&self.metrics))
            .with_default_timeout(self.default_timeout);

        for rule in matched {
            if let Err(e) = dispatcher.execute_rule_actions(rule, &event).await {
                self.metrics.record_error();
                report.failed_rules.push(rule.id.clone());
                error!(rule_id = %rule.id, error = %e, "Failed to execute rule actions");
            }
        }

        self.metrics.record_event(started.elapsed());
        report
    }
}

// ============================================================================
// Condition evaluation
// ============================================================================

/// True iff every condition of `rule` matches `event`
pub fn evaluate_rule(rule: &Rule, event: &Event) -> bool {
    rule.conditions
        .iter()
        .all(|condition| evaluate_condition(condition, event))
}

/// Evaluate one condition; malformed conditions never match
pub fn evaluate_condition(condition: &Condition, event: &Event) -> bool {
    let (kind, operator) = match (condition.kind(), condition.operator()) {
        (Ok(kind), Ok(operator)) => (kind, operator),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "Skipping malformed condition");
            return false;
        }
    };
    let Some(expected) = condition.value.as_ref() else {
        return false;
    };
    let field = condition.field.as_deref().unwrap_or_default();

    match kind {
        ConditionType::EventType => compare_str(&event.qualified_type(), operator, expected),
        ConditionType::Repository => {
            let Some(repo) = event.repository.as_ref() else {
                return false;
            };
            match field {
                "name" => compare_str(&repo.name, operator, expected),
                "full_name" => compare_str(&repo.full_name, operator, expected),
                "language" => compare_str(&repo.language, operator, expected),
                "default_branch" => compare_str(&repo.default_branch, operator, expected),
                "owner" => compare_str(&repo.owner_login, operator, expected),
                "private" => compare_bool(repo.private, operator, expected),
                other => {
                    warn!(field = %other, "Unknown repository field");
                    false
                }
            }
        }
        ConditionType::Sender => {
            let Some(sender) = event.sender.as_ref() else {
                return false;
            };
            match field {
                "login" => compare_str(&sender.login, operator, expected),
                "type" => compare_str(&sender.sender_type, operator, expected),
                "site_admin" => compare_bool(sender.site_admin, operator, expected),
                other => {
                    warn!(field = %other, "Unknown sender field");
                    false
                }
            }
        }
        // No field-path mechanism for payloads yet
        ConditionType::Payload => false,
        // No time-window predicates yet
        ConditionType::Time => true,
    }
}

/// Case-sensitive string comparison shared by all string fields
fn compare_str(actual: &str, operator: Operator, expected: &ConditionValue) -> bool {
    if operator == Operator::In {
        return expected
            .as_list()
            .is_some_and(|items| items.iter().any(|item| item == actual));
    }

    let Some(expected) = expected.as_str() else {
        return false;
    };

    match operator {
        Operator::Equals => actual == expected,
        Operator::NotEquals => actual != expected,
        Operator::Contains => actual.contains(expected),
        Operator::StartsWith => actual.starts_with(expected),
        Operator::EndsWith => actual.ends_with(expected),
        Operator::Matches => match Regex::new(expected) {
            Ok(pattern) => pattern.is_match(actual),
            Err(e) => {
                warn!(pattern = %expected, error = %e, "Invalid regular expression in condition");
                false
            }
        },
        Operator::In => false,
    }
}

/// Boolean fields only support equality
fn compare_bool(actual: bool, operator: Operator, expected: &ConditionValue) -> bool {
    let Some(expected) = expected.as_bool() else {
        return false;
    };
    match operator {
        Operator::Equals => actual == expected,
        Operator::NotEquals => actual != expected,
        _ => false,
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
