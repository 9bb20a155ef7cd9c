//! Rule, condition and action definitions.
//!
//! These types are deserialized straight from rule configuration files, so
//! condition types and operators are kept as the strings the operator wrote
//! and resolved to [`ConditionType`] / [`Operator`] on demand. Validation
//! reports every unknown name instead of failing deserialization on the
//! first one.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Opaque action parameters, interpreted by the target handler only
pub type Parameters = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Rule
// ============================================================================

/// A named AND-predicate over an event plus the actions it triggers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default)]
    pub enabled: bool,

    /// Informational only; rules run in registration order
    #[serde(default)]
    pub priority: i32,

    /// All conditions must match
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Executed in list order when the rule matches
    #[serde(default)]
    pub actions: Vec<Action>,

    /// Passed through untouched
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Rule {
    /// Check the rule shape.
    ///
    /// Returns the first problem found; action types are not checked against
    /// any handler registry here.
    pub fn validate(&self) -> Result<(), RuleValidationError> {
        if self.id.trim().is_empty() {
            return Err(RuleValidationError::MissingId);
        }
        if self.name.trim().is_empty() {
            return Err(RuleValidationError::MissingName {
                rule_id: self.id.clone(),
            });
        }
        if self.conditions.is_empty() {
            return Err(RuleValidationError::NoConditions {
                rule_id: self.id.clone(),
            });
        }
        if self.actions.is_empty() {
            return Err(RuleValidationError::NoActions {
                rule_id: self.id.clone(),
            });
        }

        for (index, condition) in self.conditions.iter().enumerate() {
            condition
                .validate()
                .map_err(|source| RuleValidationError::InvalidCondition {
                    rule_id: self.id.clone(),
                    index,
                    source,
                })?;
        }

        for (index, action) in self.actions.iter().enumerate() {
            action
                .validate()
                .map_err(|source| RuleValidationError::InvalidAction {
                    rule_id: self.id.clone(),
                    index,
                    source,
                })?;
        }

        Ok(())
    }
}

// ============================================================================
// Condition
// ============================================================================

/// One predicate clause within a rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type", default)]
    pub condition_type: String,

    /// Sub-field for repository, sender and payload conditions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(default)]
    pub operator: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ConditionValue>,
}

impl Condition {
    pub fn new(
        condition_type: ConditionType,
        operator: Operator,
        value: impl Into<ConditionValue>,
    ) -> Self {
        Self {
            condition_type: condition_type.to_string(),
            field: None,
            operator: operator.to_string(),
            value: Some(value.into()),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn kind(&self) -> Result<ConditionType, ConditionError> {
        if self.condition_type.is_empty() {
            return Err(ConditionError::MissingType);
        }
        self.condition_type.parse()
    }

    pub fn operator(&self) -> Result<Operator, ConditionError> {
        if self.operator.is_empty() {
            return Err(ConditionError::MissingOperator);
        }
        self.operator.parse()
    }

    pub fn validate(&self) -> Result<(), ConditionError> {
        let kind = self.kind()?;
        self.operator()?;
        if self.value.is_none() {
            return Err(ConditionError::MissingValue);
        }
        if kind.requires_field() && self.field.as_deref().map_or(true, str::is_empty) {
            return Err(ConditionError::MissingField { kind });
        }
        Ok(())
    }
}

/// What a condition inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionType {
    EventType,
    Repository,
    Sender,
    /// Reserved for payload inspection; never matches
    Payload,
    /// Reserved for time windows; always matches
    Time,
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EventType => "event_type",
            Self::Repository => "repository",
            Self::Sender => "sender",
            Self::Payload => "payload",
            Self::Time => "time",
        }
    }

    fn requires_field(&self) -> bool {
        matches!(self, Self::Repository | Self::Sender | Self::Payload)
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionType {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event_type" => Ok(Self::EventType),
            "repository" => Ok(Self::Repository),
            "sender" => Ok(Self::Sender),
            "payload" => Ok(Self::Payload),
            "time" => Ok(Self::Time),
            other => Err(ConditionError::InvalidType(other.to_string())),
        }
    }
}

/// Comparison applied between the event value and the condition value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    EndsWith,
    /// Regular expression search, not anchored
    Matches,
    /// Membership in a list value
    In,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Matches => "matches",
            Self::In => "in",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equals" | "==" => Ok(Self::Equals),
            "not_equals" | "!=" => Ok(Self::NotEquals),
            "contains" => Ok(Self::Contains),
            "starts_with" => Ok(Self::StartsWith),
            "ends_with" => Ok(Self::EndsWith),
            "matches" => Ok(Self::Matches),
            "in" => Ok(Self::In),
            other => Err(ConditionError::InvalidOperator(other.to_string())),
        }
    }
}

/// Comparand of a condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Bool(bool),
    String(String),
    List(Vec<String>),
}

impl ConditionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for ConditionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<&str>> for ConditionValue {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for ConditionValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

// ============================================================================
// Action
// ============================================================================

/// One effect to trigger when a rule matches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Registry key of the handler to invoke
    #[serde(rename = "type", default)]
    pub action_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,

    /// Run detached from the event's processing task
    #[serde(rename = "async", default)]
    pub run_async: bool,

    /// Duration string bounding the execution, e.g. `"30s"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

impl Action {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            parameters: Some(Parameters::new()),
            run_async: false,
            timeout: None,
        }
    }

    pub fn with_parameter(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.parameters
            .get_or_insert_with(Parameters::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn with_async(mut self, run_async: bool) -> Self {
        self.run_async = run_async;
        self
    }

    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    /// String parameter lookup
    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameters.as_ref()?.get(key)?.as_str()
    }

    pub fn validate(&self) -> Result<(), ActionValidationError> {
        if self.action_type.trim().is_empty() {
            return Err(ActionValidationError::MissingType);
        }
        if self.parameters.is_none() {
            return Err(ActionValidationError::MissingParameters);
        }
        Ok(())
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    #[error("missing type")]
    MissingType,

    #[error("invalid type: {0}")]
    InvalidType(String),

    #[error("missing operator")]
    MissingOperator,

    #[error("invalid operator: {0}")]
    InvalidOperator(String),

    #[error("missing value")]
    MissingValue,

    #[error("missing field for {kind} condition")]
    MissingField { kind: ConditionType },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionValidationError {
    #[error("missing type")]
    MissingType,

    #[error("missing parameters")]
    MissingParameters,
}

/// Reasons a rule is refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleValidationError {
    #[error("missing ID")]
    MissingId,

    #[error("({rule_id}) missing name")]
    MissingName { rule_id: String },

    #[error("({rule_id}) has no conditions")]
    NoConditions { rule_id: String },

    #[error("({rule_id}) has no actions")]
    NoActions { rule_id: String },

    #[error("({rule_id}) condition[{index}] {source}")]
    InvalidCondition {
        rule_id: String,
        index: usize,
        source: ConditionError,
    },

    #[error("({rule_id}) action[{index}] {source}")]
    InvalidAction {
        rule_id: String,
        index: usize,
        source: ActionValidationError,
    },
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod tests;
