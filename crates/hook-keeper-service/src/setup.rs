//! Engine assembly from the rule configuration.

use crate::handlers::{LogHandler, NotificationHandler};
use hook_keeper_api::EngineConfig;
use hook_keeper_core::config::{load_config_path, AutomationConfig};
use hook_keeper_core::{ConfigError, EngineError, Metrics, RuleEngine};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Errors raised while assembling the engine
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("failed to load rules: {0}")]
    Rules(#[from] ConfigError),

    #[error("failed to register rules: {0}")]
    Engine(#[from] EngineError),
}

/// Load the rule configuration at `rules_path`; no path means no rules
pub fn load_rules(rules_path: Option<&Path>) -> Result<AutomationConfig, SetupError> {
    match rules_path {
        Some(path) => Ok(load_config_path(path)?),
        None => {
            warn!("No rules path configured; events will be accepted but match nothing");
            Ok(AutomationConfig::default())
        }
    }
}

/// Worker pool size: the service setting, capped by `global.max_concurrency`
pub fn worker_count(engine: &EngineConfig, automation: &AutomationConfig) -> usize {
    let workers = automation.global.worker_limit(engine.workers);
    if workers < engine.workers {
        info!(
            configured = engine.workers,
            max_concurrency = automation.global.max_concurrency,
            "Capping workers at max_concurrency"
        );
    }
    workers
}

/// Build an engine with the built-in handlers and every active rule
pub fn build_engine(automation: &AutomationConfig) -> Result<RuleEngine, SetupError> {
    let mut engine = RuleEngine::new(Arc::new(Metrics::new()))
        .with_default_timeout(automation.global.default_timeout());

    engine.register_handler(
        "notification",
        Arc::new(NotificationHandler::new(&automation.global)),
    )?;
    engine.register_handler("log", Arc::new(LogHandler::new(&automation.global)))?;

    if !automation.global.enabled {
        warn!("Rule configuration is globally disabled; no rules loaded");
    }

    engine.replace_rules(automation.active_rules().to_vec())?;

    let rules = engine.rules();
    info!(
        rules = rules.len(),
        enabled = rules.iter().filter(|r| r.enabled).count(),
        handlers = ?engine.registry().action_types(),
        "Rule engine ready"
    );

    Ok(engine)
}

#[cfg(test)]
#[path = "setup_tests.rs"]
mod tests;
