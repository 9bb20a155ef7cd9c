//! Tests for engine assembly.

use super::*;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

const RULES: &str = r#"
global:
  default_timeout: "10s"
  notification_urls:
    default: "https://example.com/hook"
rules:
  - id: notify-push
    name: Notify on push
    enabled: true
    conditions:
      - { type: event_type, operator: equals, value: push }
    actions:
      - type: notification
        parameters: { message: "push to {{repo.name}}" }
  - id: dormant
    name: Dormant rule
    conditions:
      - { type: event_type, operator: equals, value: issues }
    actions:
      - { type: log, parameters: {} }
"#;

#[test]
fn test_no_rules_path_yields_empty_config() {
    let config = load_rules(None).unwrap();

    assert!(config.rules.is_empty());
}

#[test]
fn test_engine_has_builtin_handlers_and_rules() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules.yaml");
    fs::write(&path, RULES).unwrap();

    let automation = load_rules(Some(&path)).unwrap();
    let engine = build_engine(&automation).unwrap();

    assert_eq!(
        engine.registry().action_types(),
        vec!["log".to_string(), "notification".to_string()]
    );
    assert_eq!(engine.rules().len(), 2);
    assert_eq!(automation.global.default_timeout(), Some(Duration::from_secs(10)));
}

#[test]
fn test_globally_disabled_config_loads_no_rules() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules.yaml");
    fs::write(&path, RULES.replace("global:\n", "global:\n  enabled: false\n")).unwrap();

    let automation = load_rules(Some(&path)).unwrap();
    let engine = build_engine(&automation).unwrap();

    assert!(engine.rules().is_empty());
}

/// Handler parameter checks run when rules are registered
#[test]
fn test_notification_without_message_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules.yaml");
    fs::write(
        &path,
        RULES.replace(
            "parameters: { message: \"push to {{repo.name}}\" }",
            "parameters: { type: default }",
        ),
    )
    .unwrap();

    let automation = load_rules(Some(&path)).unwrap();
    let err = build_engine(&automation).unwrap_err();

    assert!(matches!(err, SetupError::Engine(EngineError::InvalidParameters { .. })));
}

#[test]
fn test_missing_rules_file_is_an_error() {
    let dir = TempDir::new().unwrap();

    let err = load_rules(Some(&dir.path().join("absent.yaml"))).unwrap_err();

    assert!(matches!(err, SetupError::Rules(ConfigError::FileNotFound { .. })));
}

#[test]
fn test_max_concurrency_caps_service_workers() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules.yaml");
    fs::write(&path, RULES.replace("global:\n", "global:\n  max_concurrency: 3\n")).unwrap();
    let automation = load_rules(Some(&path)).unwrap();

    let mut engine_config = EngineConfig::default();
    engine_config.workers = 10;
    assert_eq!(worker_count(&engine_config, &automation), 3);

    engine_config.workers = 2;
    assert_eq!(worker_count(&engine_config, &automation), 2);
}
