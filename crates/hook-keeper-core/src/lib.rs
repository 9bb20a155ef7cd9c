//! # Hook-Keeper Core
//!
//! Core business logic for the Hook-Keeper webhook automation engine.
//!
//! This crate turns signed webhook deliveries into normalized events, matches
//! them against operator-defined rules and dispatches the actions of every
//! matching rule to pluggable handlers.
//!
//! ## Architecture
//!
//! - [`signature`] verifies the HMAC digest of a delivery body
//! - [`parser`] normalizes a delivery into an [`event::Event`]
//! - [`worker`] buffers events in a bounded queue drained by a fixed worker pool
//! - [`engine`] evaluates rules and hands matched actions to the [`dispatcher`]
//! - [`metrics`] aggregates counters shared by every stage
//!
//! ## Usage
//!
//! ```rust
//! use hook_keeper_core::{EventId, Timestamp};
//!
//! let generated = EventId::generate();
//! let supplied = EventId::new("72d3162e-cc78-11e3-81ab-4c9367dc0958");
//! assert_ne!(generated, supplied);
//!
//! let now = Timestamp::now();
//! assert!(!now.to_rfc3339().is_empty());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod event;
pub mod metrics;
pub mod parser;
pub mod rules;
pub mod signature;
pub mod template;
pub mod worker;

pub use config::{AutomationConfig, ConfigError, GlobalConfig};
pub use dispatcher::{ActionError, ActionHandler, HandlerRegistry};
pub use engine::{EngineError, RuleEngine};
pub use event::{Event, EventPayload, RepositoryInfo, SenderInfo};
pub use metrics::{Metrics, MetricsSnapshot};
pub use parser::{EventParser, ParseError, WebhookDelivery};
pub use rules::{Action, Condition, ConditionType, ConditionValue, Operator, Rule};
pub use signature::SignatureVerifier;
pub use worker::{EnqueueError, WorkerPool};

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Identifier of one webhook delivery.
///
/// Carries the delivery id supplied by the source platform when present,
/// otherwise a generated UUID. Used as a label only; two deliveries with the
/// same id are still processed as distinct events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Wrap a platform supplied delivery id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh unique id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Time Types
// ============================================================================

/// UTC timestamp used for event acceptance times and HTTP responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

// ============================================================================
// Duration Parsing
// ============================================================================

/// Parse a compound duration string such as `"500ms"`, `"30s"` or `"1h30m"`.
///
/// Accepted units are `ns`, `us`, `ms`, `s`, `m` and `h`. Fractional values
/// (`"1.5s"`) are allowed. Returns `None` for anything that does not parse,
/// including the empty string and values without a unit.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if input == "0" {
        return Some(Duration::ZERO);
    }

    let mut total = 0f64;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds_per_unit = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total += value * seconds_per_unit;
    }

    Duration::try_from_secs_f64(total).ok()
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
