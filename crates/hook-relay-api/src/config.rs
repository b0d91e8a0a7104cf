//! Configuration types for the HTTP service
//!
//! Every field carries a serde default, so an empty file (or no file at all)
//! yields a runnable configuration. Layered loading is handled by
//! [`ConfigSources`].

use crate::errors::ConfigError;
use hook_relay_core::{ClientConfig, SharedSecret, TriggerPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the shared webhook secret.
pub const SECRET_ENV_VAR: &str = "WEBHOOK_SECRET";

/// Environment variable naming an explicit configuration file.
pub const CONFIG_FILE_ENV_VAR: &str = "HOOK_RELAY_CONFIG_FILE";

/// Prefix of configuration overrides, e.g. `HOOK_RELAY__SERVER__PORT=9090`.
pub const ENV_PREFIX: &str = "HOOK_RELAY";

/// Service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Webhook processing settings
    pub webhook: WebhookConfig,

    /// Upstream API settings
    pub upstream: UpstreamConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Webhook processing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Webhook endpoint path
    pub endpoint_path: String,

    /// Reject deliveries whose signature cannot be verified
    pub require_signature: bool,

    /// Which pull request actions trigger a commit fetch
    pub trigger_policy: TriggerPolicy,

    /// Where the last accepted payload is written
    pub archive_path: PathBuf,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/github-webhook".to_string(),
            require_signature: false,
            trigger_policy: TriggerPolicy::Literal,
            archive_path: PathBuf::from("samples/payload.json"),
        }
    }
}

/// Upstream API configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// API base URL
    pub api_base_url: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// User agent override
    pub user_agent: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            api_base_url: client.api_base_url,
            timeout_seconds: client.timeout.as_secs(),
            user_agent: None,
        }
    }
}

impl UpstreamConfig {
    /// Client configuration for [`hook_relay_core::GitHubUpstreamClient`]
    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::default()
            .with_api_base_url(self.api_base_url.clone())
            .with_timeout(Duration::from_secs(self.timeout_seconds));

        match &self.user_agent {
            Some(user_agent) => config.with_user_agent(user_agent.clone()),
            None => config,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level for the hook-relay crates
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Default `EnvFilter` directives when `RUST_LOG` is not set
    pub fn default_directives(&self) -> String {
        format!(
            "hook_relay_service={level},hook_relay_api={level},hook_relay_core={level},tower_http=debug",
            level = self.level
        )
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ServiceConfig {
    /// Check the configuration for values the service cannot run with.
    ///
    /// `secret` is the shared secret read from [`SECRET_ENV_VAR`]; it is
    /// required when `webhook.require_signature` is set.
    pub fn validate(&self, secret: Option<&SharedSecret>) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must be non-zero".to_string(),
            });
        }

        if self.server.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be non-zero".to_string(),
            });
        }

        if !self.webhook.endpoint_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                message: format!(
                    "webhook.endpoint_path must start with '/', got '{}'",
                    self.webhook.endpoint_path
                ),
            });
        }

        if self.webhook.endpoint_path == "/health" {
            return Err(ConfigError::Invalid {
                message: "webhook.endpoint_path conflicts with the health endpoint".to_string(),
            });
        }

        if self.webhook.archive_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing {
                key: "webhook.archive_path".to_string(),
            });
        }

        if self.upstream.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "upstream.timeout_seconds must be non-zero".to_string(),
            });
        }

        let base_url =
            url::Url::parse(&self.upstream.api_base_url).map_err(|e| ConfigError::Invalid {
                message: format!(
                    "upstream.api_base_url '{}' is not a valid URL: {}",
                    self.upstream.api_base_url, e
                ),
            })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                message: format!(
                    "upstream.api_base_url must use http or https, got '{}'",
                    base_url.scheme()
                ),
            });
        }

        if self.webhook.require_signature && !secret.is_some_and(|s| !s.is_empty()) {
            return Err(ConfigError::Missing {
                key: SECRET_ENV_VAR.to_string(),
            });
        }

        Ok(())
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Configuration sources, applied in order; later sources override earlier
/// ones.
///
/// 1. system-wide YAML file (`/etc/hook-relay/service.yaml`)
/// 2. deployment-local YAML file (`config/service.yaml`)
/// 3. explicit file named by [`CONFIG_FILE_ENV_VAR`]; must exist when given
/// 4. environment variables `HOOK_RELAY__SECTION__KEY`
///
/// A malformed file or an environment value of the wrong type is an error.
#[derive(Debug, Clone)]
pub struct ConfigSources {
    pub system_file: PathBuf,
    pub local_file: PathBuf,
    pub explicit_file: Option<PathBuf>,
    pub env_prefix: String,
}

impl Default for ConfigSources {
    fn default() -> Self {
        Self {
            system_file: PathBuf::from("/etc/hook-relay/service"),
            local_file: PathBuf::from("config/service"),
            explicit_file: None,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }
}

impl ConfigSources {
    /// Default sources plus the explicit file from the environment, if set
    pub fn from_env() -> Self {
        let explicit_file = std::env::var(CONFIG_FILE_ENV_VAR)
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        Self {
            explicit_file,
            ..Self::default()
        }
    }

    /// Build the layered configuration
    pub fn load(&self) -> Result<ServiceConfig, ConfigError> {
        let mut builder = ::config::Config::builder()
            .add_source(yaml_file(&self.system_file).required(false))
            .add_source(yaml_file(&self.local_file).required(false));

        if let Some(explicit) = &self.explicit_file {
            builder = builder.add_source(yaml_file(explicit).required(true));
        }

        let config = builder
            .add_source(::config::Environment::with_prefix(&self.env_prefix).separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

impl ServiceConfig {
    /// Load a single configuration file; the format follows the extension
    /// (`.yaml`, `.yml`, `.json` or `.toml`).
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config = ::config::Config::builder()
            .add_source(::config::File::from(path).required(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

fn yaml_file(path: &Path) -> ::config::File<::config::FileSourceFile, ::config::FileFormat> {
    ::config::File::from(path).format(::config::FileFormat::Yaml)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
