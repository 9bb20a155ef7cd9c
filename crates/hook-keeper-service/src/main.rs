//! # Hook-Keeper Service
//!
//! Binary entry point for the Hook-Keeper HTTP service.
//!
//! This executable:
//! - Loads service configuration from files and environment
//! - Initializes logging
//! - Loads the automation rules and registers the built-in action handlers
//! - Starts the HTTP server and worker pool from hook-keeper-api

mod handlers;
mod setup;

use hook_keeper_api::{start_server, LoggingConfig, ServiceConfig};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order, later sources override earlier ones):
    //  1. /etc/hook-keeper/service.yaml   system-wide defaults
    //  2. ./config/service.yaml           deployment-local override
    //  3. Path given by HK_CONFIG_FILE    operator-specified file
    //  4. Environment variables prefixed HK__ (double-underscore separator)
    //     e.g. HK__SERVER__PORT=9090 sets server.port = 9090
    //
    // Every field has a default, so no files at all is a valid setup. A
    // malformed file or an uncoercible variable is a hard error.
    // -------------------------------------------------------------------------
    let loaded = load_service_config();

    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    init_tracing(&logging);

    let mut service_config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Could not load service configuration; aborting");
            std::process::exit(3);
        }
    };

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }

    info!("Starting Hook-Keeper Service");

    if service_config.webhooks.secret.as_deref().map_or(true, str::is_empty) {
        warn!("No webhook secret configured; signature verification is disabled");
    }

    // -------------------------------------------------------------------------
    // Build the rule engine
    // -------------------------------------------------------------------------
    let rules_path = service_config.engine.rules_path.as_deref().map(Path::new);
    let rules = match setup::load_rules(rules_path) {
        Ok(rules) => rules,
        Err(e) => {
            error!(error = %e, "Rule configuration is invalid; aborting");
            std::process::exit(3);
        }
    };
    service_config.engine.workers = setup::worker_count(&service_config.engine, &rules);

    let engine = match setup::build_engine(&rules) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!(error = %e, "Rule configuration is invalid; aborting");
            std::process::exit(3);
        }
    };

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        queue_capacity = service_config.engine.queue_capacity,
        workers = service_config.engine.workers,
        "Starting HTTP server"
    );

    if let Err(e) = start_server(service_config, engine).await {
        error!("Server stopped with error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn load_service_config() -> Result<ServiceConfig, config::ConfigError> {
    let mut config_builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/hook-keeper/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Ok(explicit_path) = std::env::var("HK_CONFIG_FILE") {
        if !explicit_path.is_empty() {
            config_builder = config_builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }
    }

    config_builder
        .add_source(config::Environment::with_prefix("HK").separator("__"))
        .build()?
        .try_deserialize()
}

/// Install the global subscriber; `RUST_LOG` overrides the configured level
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "hook_keeper_service={level},hook_keeper_api={level},hook_keeper_core={level},tower_http=info",
            level = logging.level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
