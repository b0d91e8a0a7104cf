//! # Hook-Relay Service
//!
//! Binary entry point for the Hook-Relay HTTP service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes logging
//! - Reads the shared webhook secret and wires the ingestion pipeline
//! - Starts the HTTP server from hook-relay-api
//!
//! Exit codes: 1 bind failure, 2 server failure, 3 invalid configuration.

use hook_relay_api::{
    build_pipeline, start_server, ConfigSources, LoggingConfig, ServiceConfig, SECRET_ENV_VAR,
};
use hook_relay_core::SharedSecret;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CONFIG_EXIT_CODE: i32 = 3;

#[tokio::main]
async fn main() {
    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order, later sources override earlier ones):
    //  1. /etc/hook-relay/service.yaml       system-wide defaults
    //  2. ./config/service.yaml              deployment-local override
    //  3. Path given by HOOK_RELAY_CONFIG_FILE
    //  4. Environment variables HOOK_RELAY__SECTION__KEY
    //     e.g. HOOK_RELAY__SERVER__PORT=9090 sets server.port = 9090
    //
    // Logging is configured from the loaded file, so a load failure is
    // reported through a default subscriber.
    // -------------------------------------------------------------------------
    let loaded = ConfigSources::from_env().load();

    let default_logging = LoggingConfig::default();
    let logging = loaded
        .as_ref()
        .map(|c| &c.logging)
        .unwrap_or(&default_logging);
    init_tracing(logging);

    info!("Starting Hook-Relay Service");

    let service_config: ServiceConfig = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(
                error = %e,
                "Could not load service configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(CONFIG_EXIT_CODE);
        }
    };

    let secret = read_secret();
    if secret.is_none() {
        warn!(
            env = SECRET_ENV_VAR,
            "No webhook secret configured; signatures are not checked and every credential decryption will fail"
        );
    }

    if let Err(e) = service_config.validate(secret.as_ref()) {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(CONFIG_EXIT_CODE);
    }

    let pipeline = match build_pipeline(&service_config, secret) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!(error = %e, "Failed to build ingestion pipeline; aborting");
            std::process::exit(e.exit_code());
        }
    };

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        endpoint = %service_config.webhook.endpoint_path,
        trigger_policy = %service_config.webhook.trigger_policy,
        require_signature = service_config.webhook.require_signature,
        archive_path = %service_config.webhook.archive_path.display(),
        "Configuration loaded"
    );

    if let Err(e) = start_server(service_config, pipeline).await {
        error!("Failed to start server: {}", e);
        std::process::exit(e.exit_code());
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.default_directives()));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Shared secret from the environment; empty or unset means not configured.
fn read_secret() -> Option<SharedSecret> {
    SharedSecret::from_optional(std::env::var(SECRET_ENV_VAR).ok())
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
