//! Prometheus exposition of the engine counters.
//!
//! Each [`ServiceMetrics`] owns its own registry so several app instances can
//! live in one process (tests build many). Engine counters are copied in at
//! scrape time; webhook outcomes are counted as requests arrive.

use hook_keeper_core::MetricsSnapshot;
use prometheus::{
    Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::{Arc, Mutex, PoisonError};

/// Service metrics for observability
#[derive(Debug)]
pub struct ServiceMetrics {
    registry: Registry,

    /// Serializes read-then-advance of the engine counters across scrapes
    sync_lock: Mutex<()>,

    pub events_processed_total: IntCounter,
    pub rules_evaluated_total: IntCounter,
    pub actions_executed_total: IntCounter,
    pub errors_total: IntCounter,
    pub avg_processing_ms: Gauge,
    pub queue_size: IntGauge,

    /// Webhook requests by outcome: accepted, bad_request, unauthorized, unavailable
    pub webhook_requests_total: IntCounterVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new_custom(Some("hook_keeper".to_string()), None)?;

        let events_processed_total =
            IntCounter::new("events_processed_total", "Events run through the rule engine")?;
        let rules_evaluated_total =
            IntCounter::new("rules_evaluated_total", "Enabled rules evaluated")?;
        let actions_executed_total =
            IntCounter::new("actions_executed_total", "Actions dispatched to handlers")?;
        let errors_total = IntCounter::new("errors_total", "Failed rules and async actions")?;
        let avg_processing_ms = Gauge::new(
            "avg_processing_milliseconds",
            "Mean time to process one event",
        )?;
        let queue_size = IntGauge::new("queue_size", "Events waiting for a worker")?;
        let webhook_requests_total = IntCounterVec::new(
            Opts::new("webhook_requests_total", "Webhook requests by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(events_processed_total.clone()))?;
        registry.register(Box::new(rules_evaluated_total.clone()))?;
        registry.register(Box::new(actions_executed_total.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;
        registry.register(Box::new(avg_processing_ms.clone()))?;
        registry.register(Box::new(queue_size.clone()))?;
        registry.register(Box::new(webhook_requests_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            sync_lock: Mutex::new(()),
            events_processed_total,
            rules_evaluated_total,
            actions_executed_total,
            errors_total,
            avg_processing_ms,
            queue_size,
            webhook_requests_total,
        }))
    }

    pub fn record_webhook(&self, outcome: &str) {
        self.webhook_requests_total.with_label_values(&[outcome]).inc();
    }

    /// Bring the engine counters up to `snapshot`.
    ///
    /// Engine counters only grow, so each Prometheus counter is advanced by
    /// the difference. Concurrent calls are serialized so a difference is
    /// never applied twice.
    pub fn sync(&self, snapshot: &MetricsSnapshot, queue_size: usize) {
        let _guard = self.sync_lock.lock().unwrap_or_else(PoisonError::into_inner);
        advance(&self.events_processed_total, snapshot.events_processed);
        advance(&self.rules_evaluated_total, snapshot.rules_evaluated);
        advance(&self.actions_executed_total, snapshot.actions_executed);
        advance(&self.errors_total, snapshot.errors);
        self.avg_processing_ms.set(snapshot.avg_processing_ms());
        self.queue_size.set(i64::try_from(queue_size).unwrap_or(i64::MAX));
    }

    /// Text exposition of every registered metric
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
