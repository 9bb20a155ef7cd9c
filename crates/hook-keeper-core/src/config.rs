//! Rule configuration files.
//!
//! A configuration holds a version tag, global settings shared by every rule
//! and the rule list itself. Files are YAML or JSON; a directory of YAML files
//! is merged into one configuration before validation.

use crate::parse_duration;
use crate::rules::Rule;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// The only configuration version understood by this crate
pub const SUPPORTED_VERSION: &str = "1.0";

/// A complete rule configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationConfig {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            global: GlobalConfig::default(),
            rules: Vec::new(),
        }
    }
}

/// Settings that apply to every rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// When false no rule from this configuration is loaded
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Timeout for actions without their own, e.g. "30s"
    #[serde(default = "default_timeout")]
    pub default_timeout: String,

    /// Upper bound on concurrent event workers; zero means no bound
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Named notification endpoints, e.g. `slack`
    #[serde(default)]
    pub notification_urls: HashMap<String, String>,

    /// Values exposed to action templates as `{{var.<name>}}`
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            default_timeout: default_timeout(),
            max_concurrency: default_max_concurrency(),
            notification_urls: HashMap::new(),
            variables: HashMap::new(),
        }
    }
}

impl GlobalConfig {
    /// Parsed `default_timeout`; `None` when empty, zero or malformed
    pub fn default_timeout(&self) -> Option<Duration> {
        parse_duration(&self.default_timeout).filter(|timeout| !timeout.is_zero())
    }

    /// Worker count after applying `max_concurrency` to `configured`
    pub fn worker_limit(&self, configured: usize) -> usize {
        match self.max_concurrency {
            0 => configured,
            limit => configured.min(limit),
        }
    }

    /// Variables rendered as plain strings for template substitution
    pub fn template_variables(&self) -> HashMap<String, String> {
        self.variables
            .iter()
            .map(|(name, value)| {
                let rendered = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (name.clone(), rendered)
            })
            .collect()
    }
}

fn default_version() -> String {
    SUPPORTED_VERSION.to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_timeout() -> String {
    "30s".to_string()
}

fn default_max_concurrency() -> usize {
    10
}

impl AutomationConfig {
    /// Rules the service should load: none when globally disabled
    pub fn active_rules(&self) -> &[Rule] {
        if self.global.enabled {
            &self.rules
        } else {
            &[]
        }
    }

    /// Check the configuration, collecting every problem found.
    ///
    /// Action parameters are not checked here; that needs the handler
    /// registry and happens when rules are added to the engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.version != SUPPORTED_VERSION {
            errors.push(format!("unsupported config version: {}", self.version));
        }

        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !rule.id.is_empty() && !seen.insert(rule.id.as_str()) {
                errors.push(format!("duplicate rule ID: {}", rule.id));
            }
        }

        for (index, rule) in self.rules.iter().enumerate() {
            if let Err(e) = rule.validate() {
                errors.push(format!("rule[{}] {}", index, e));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation { errors })
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Load and validate one configuration file.
///
/// `.yaml`/`.yml` are read as YAML, `.json` as JSON and anything else is
/// tried as YAML.
pub fn load_config(path: &Path) -> Result<AutomationConfig, ConfigError> {
    let config = read_config_file(path)?;
    config.validate()?;
    info!(
        path = %path.display(),
        rules = config.rules.len(),
        "Loaded rule configuration"
    );
    Ok(config)
}

/// Load every YAML file in `dir`, merge them in file name order and validate
/// the result. Other files are ignored.
pub fn load_config_from_directory(dir: &Path) -> Result<AutomationConfig, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::FileNotFound {
            path: dir.display().to_string(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        let path = entry.path();
        if path.is_file() && is_yaml(&path) {
            paths.push(path);
        } else {
            debug!(path = %path.display(), "Skipping non-YAML entry");
        }
    }
    paths.sort();

    let configs = paths
        .iter()
        .map(|path| read_config_file(path))
        .collect::<Result<Vec<_>, _>>()?;

    let merged = merge_configs(configs);
    merged.validate()?;
    info!(
        path = %dir.display(),
        files = paths.len(),
        rules = merged.rules.len(),
        "Loaded rule configuration directory"
    );
    Ok(merged)
}

/// Load `path` as a directory or a single file
pub fn load_config_path(path: &Path) -> Result<AutomationConfig, ConfigError> {
    if path.is_dir() {
        load_config_from_directory(path)
    } else {
        load_config(path)
    }
}

/// Combine configurations in order.
///
/// Rules are concatenated, scalar settings take the last value and the
/// notification and variable maps are merged key by key with later files
/// winning.
pub fn merge_configs(configs: impl IntoIterator<Item = AutomationConfig>) -> AutomationConfig {
    let mut merged = AutomationConfig::default();

    for config in configs {
        merged.version = config.version;
        merged.global.enabled = config.global.enabled;
        merged.global.default_timeout = config.global.default_timeout;
        merged.global.max_concurrency = config.global.max_concurrency;
        merged
            .global
            .notification_urls
            .extend(config.global.notification_urls);
        merged.global.variables.extend(config.global.variables);
        merged.rules.extend(config.rules);
    }

    merged
}

fn read_config_file(path: &Path) -> Result<AutomationConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: format!("invalid JSON: {}", e),
        })
    } else {
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: format!("invalid YAML: {}", e),
        })
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while loading rule configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("configuration validation failed: {}", errors.join("; "))]
    Validation { errors: Vec<String> },
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
