//! Process-wide counters for event processing.

use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Point-in-time copy of the engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub events_processed: u64,
    pub rules_evaluated: u64,
    pub actions_executed: u64,
    pub errors: u64,
    #[serde(skip)]
    pub total_processing_time: Duration,
}

impl MetricsSnapshot {
    /// Mean processing time per event in milliseconds, zero before the first event
    pub fn avg_processing_ms(&self) -> f64 {
        if self.events_processed == 0 {
            return 0.0;
        }
        self.total_processing_time.as_secs_f64() * 1000.0 / self.events_processed as f64
    }
}

/// Thread-safe metrics aggregator.
///
/// Every update holds the lock for a single counter increment. Readers take a
/// consistent [`MetricsSnapshot`] of all counters at once.
#[derive(Debug, Default)]
pub struct Metrics {
    counters: Mutex<MetricsSnapshot>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MetricsSnapshot> {
        // Counters stay meaningful even if a holder panicked
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_event(&self, elapsed: Duration) {
        let mut counters = self.lock();
        counters.events_processed += 1;
        counters.total_processing_time += elapsed;
    }

    pub fn record_rule_evaluated(&self) {
        self.lock().rules_evaluated += 1;
    }

    pub fn record_action_executed(&self) {
        self.lock().actions_executed += 1;
    }

    pub fn record_error(&self) {
        self.lock().errors += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        *self.lock()
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
