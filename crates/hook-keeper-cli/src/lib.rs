//! # Hook-Keeper CLI
//!
//! Command-line tooling for automation rule files.
//!
//! This module provides CLI commands for:
//! - Validating a rule file or directory
//! - Dry-running a stored webhook payload against the rules
//! - Printing an example configuration

use bytes::Bytes;
use clap::{Parser, Subcommand};
use hook_keeper_core::config::load_config_path;
use hook_keeper_core::{
    ConfigError, EngineError, EventParser, ParseError, RuleEngine, WebhookDelivery,
};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ============================================================================
// CLI Structure
// ============================================================================

/// Hook-Keeper CLI - rule tooling for webhook automation
#[derive(Parser)]
#[command(name = "hook-keeper")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate and dry-run webhook automation rules")]
pub struct Cli {
    /// Logging level
    #[arg(short, long, default_value = "warn", env = "HK_LOG_LEVEL", global = true)]
    pub log_level: String,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Validate a rule file or a directory of rule files
    Validate {
        /// Rule file (.yaml, .yml, .json) or directory
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Show which rules match a stored webhook payload, without running actions
    Test {
        /// Rule file or directory
        #[arg(short, long)]
        config: PathBuf,

        /// JSON file holding the webhook body
        #[arg(short, long)]
        event: PathBuf,

        /// Event type, as sent in the event header
        #[arg(short = 't', long)]
        event_type: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print an example rule configuration
    Example,
}

/// Output formats
#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

// ============================================================================
// Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Invalid event: {0}")]
    Event(#[from] ParseError),

    #[error("Rule error: {0}")]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Engine(_) => 1,
            Self::Event(_) => 2,
            Self::Io(_) | Self::Output(_) => 3,
        }
    }
}

// ============================================================================
// Entry Points
// ============================================================================

/// Parse arguments from the process and run the command against stdout
pub fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    initialize_logging(&cli.log_level);

    let stdout = std::io::stdout();
    execute(cli.command, &mut stdout.lock())
}

/// Run `command`, writing results to `out`
pub fn execute(command: Commands, out: &mut impl Write) -> Result<(), CliError> {
    match command {
        Commands::Validate { config } => execute_validate_command(&config, out),
        Commands::Test {
            config,
            event,
            event_type,
            format,
        } => execute_test_command(&config, &event, event_type, format, out),
        Commands::Example => {
            out.write_all(EXAMPLE_CONFIG.as_bytes())?;
            Ok(())
        }
    }
}

/// Log to stderr so command output stays machine-readable
fn initialize_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    // A subscriber may already be installed when embedded; keep it
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

// ============================================================================
// Command Implementations
// ============================================================================

fn execute_validate_command(config: &Path, out: &mut impl Write) -> Result<(), CliError> {
    let automation = load_config_path(config)?;
    let enabled = automation.rules.iter().filter(|r| r.enabled).count();

    info!(path = %config.display(), "Configuration validated");
    writeln!(
        out,
        "Configuration is valid: {} rules ({} enabled)",
        automation.rules.len(),
        enabled
    )?;
    if !automation.global.enabled {
        writeln!(out, "Note: global.enabled is false; the service will load no rules")?;
    }
    Ok(())
}

/// Result of a dry run
#[derive(Debug, Serialize)]
pub struct MatchReport {
    pub event_type: String,
    pub rules_evaluated: usize,
    pub matched_rules: Vec<String>,
}

fn execute_test_command(
    config: &Path,
    event_path: &Path,
    event_type: String,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let automation = load_config_path(config)?;

    let engine = RuleEngine::default();
    engine.replace_rules(automation.active_rules().to_vec())?;

    let body = std::fs::read(event_path)?;
    let event = EventParser::default().parse(WebhookDelivery::new(
        Some(event_type),
        None,
        Bytes::from(body),
    ))?;
    debug!(event_type = %event.qualified_type(), "Parsed event");

    let rules = engine.rules();
    let report = MatchReport {
        event_type: event.qualified_type(),
        rules_evaluated: rules.iter().filter(|r| r.enabled).count(),
        matched_rules: engine
            .matching_rules(&event)
            .into_iter()
            .map(|rule| rule.id)
            .collect(),
    };

    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
        OutputFormat::Text => {
            writeln!(
                out,
                "Event {}: {} of {} enabled rules matched",
                report.event_type,
                report.matched_rules.len(),
                report.rules_evaluated
            )?;
            for rule_id in &report.matched_rules {
                writeln!(out, "  - {}", rule_id)?;
            }
        }
    }
    Ok(())
}

/// Printed by `hook-keeper example`
pub const EXAMPLE_CONFIG: &str = r#"version: "1.0"

global:
  enabled: true
  default_timeout: "30s"
  max_concurrency: 10
  notification_urls:
    default: "https://hooks.example.com/automation"
  variables:
    team: "platform"

rules:
  - id: announce-releases
    name: Announce published releases
    enabled: true
    conditions:
      - type: event_type
        operator: equals
        value: release.published
    actions:
      - type: notification
        async: true
        timeout: "10s"
        parameters:
          message: "{{repo.full_name}} released by {{sender.login}}"

  - id: audit-main-pushes
    name: Log pushes to service repositories
    enabled: true
    priority: 10
    conditions:
      - type: event_type
        operator: equals
        value: push
      - type: repository
        field: name
        operator: matches
        value: "-service$"
      - type: sender
        field: login
        operator: not_equals
        value: "release-bot"
    actions:
      - type: log
        parameters:
          message: "{{sender.login}} pushed to {{repo.name}} ({{var.team}})"
"#;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
