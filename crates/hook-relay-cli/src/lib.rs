//! # Hook-Relay CLI
//!
//! Operator tools for Hook-Relay deployments:
//! - signing and verifying webhook bodies with the shared secret
//! - sealing a bearer credential into the two delivery headers
//! - checking a service configuration file before deploying it

use clap::{Parser, Subcommand};
use hook_relay_api::{ConfigError, ServiceConfig, SECRET_ENV_VAR};
use hook_relay_core::{credential, signature, SharedSecret, ValidationError};
use rand::RngCore;
use std::path::{Path, PathBuf};
use tracing::debug;

// ============================================================================
// CLI Structure
// ============================================================================

/// Hook-Relay CLI - operator tools for the webhook relay
#[derive(Debug, Parser)]
#[command(name = "hook-relay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator tools for the Hook-Relay webhook service")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the X-Hub-Signature-256 value for a body
    Sign {
        /// Environment variable holding the shared secret
        #[arg(long, default_value = SECRET_ENV_VAR)]
        secret_env: String,

        /// File containing the exact request body
        #[arg(long)]
        body: PathBuf,
    },

    /// Check a signature against a body (exit 0 when valid, 1 otherwise)
    Verify {
        /// Environment variable holding the shared secret
        #[arg(long, default_value = SECRET_ENV_VAR)]
        secret_env: String,

        /// File containing the exact request body
        #[arg(long)]
        body: PathBuf,

        /// Signature header value, `sha256=<hex>`
        #[arg(long)]
        signature: String,
    },

    /// Encrypt a credential into X-Encrypted-Token / X-Token-IV headers
    Seal {
        /// Environment variable holding the shared secret
        #[arg(long, default_value = SECRET_ENV_VAR)]
        secret_env: String,

        /// Environment variable holding the credential to encrypt
        #[arg(long)]
        token_env: String,

        /// 16-byte IV as hex; random when omitted
        #[arg(long)]
        iv: Option<String>,
    },

    /// Load and validate a service configuration file
    Config {
        /// Configuration file (.yaml, .yml, .json or .toml)
        #[arg(short, long)]
        file: PathBuf,
    },
}

// ============================================================================
// Errors
// ============================================================================

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Signature does not match")]
    VerificationFailed,

    #[error("Environment variable {name} is not set or empty")]
    MissingEnvironment { name: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::VerificationFailed => 1,
            Self::MissingEnvironment { .. } => 2,
            Self::InvalidArgument { .. } => 2,
            Self::Configuration(_) => 3,
            Self::CommandFailed { .. } => 4,
            Self::Io(_) => 5,
        }
    }
}

impl From<ValidationError> for CliError {
    fn from(e: ValidationError) -> Self {
        Self::InvalidArgument {
            arg: "input".to_string(),
            message: e.to_string(),
        }
    }
}

// ============================================================================
// Command Execution
// ============================================================================

/// Parse process arguments and run the selected command.
///
/// Returns the text to print on stdout.
pub fn run_cli() -> Result<String, CliError> {
    run(Cli::parse())
}

/// Run an already parsed command
pub fn run(cli: Cli) -> Result<String, CliError> {
    match cli.command {
        Commands::Sign { secret_env, body } => execute_sign(&secret_env, &body),
        Commands::Verify {
            secret_env,
            body,
            signature,
        } => execute_verify(&secret_env, &body, &signature),
        Commands::Seal {
            secret_env,
            token_env,
            iv,
        } => execute_seal(&secret_env, &token_env, iv.as_deref()),
        Commands::Config { file } => execute_config(&file),
    }
}

fn execute_sign(secret_env: &str, body: &Path) -> Result<String, CliError> {
    let secret = secret_from_env(secret_env)?;
    let body = std::fs::read(body)?;

    debug!(body_len = body.len(), "Signing body");
    Ok(signature::sign(&secret, &body))
}

fn execute_verify(secret_env: &str, body: &Path, provided: &str) -> Result<String, CliError> {
    let secret = secret_from_env(secret_env)?;
    let body = std::fs::read(body)?;

    if signature::verify(&secret, &body, provided) {
        Ok("Signature valid".to_string())
    } else {
        Err(CliError::VerificationFailed)
    }
}

fn execute_seal(secret_env: &str, token_env: &str, iv_hex: Option<&str>) -> Result<String, CliError> {
    let secret = secret_from_env(secret_env)?;
    let token = non_empty_env(token_env)?;

    let iv = match iv_hex {
        Some(hex_value) => parse_iv(hex_value)?,
        None => {
            let mut iv = [0u8; credential::BLOCK_SIZE];
            rand::rng().fill_bytes(&mut iv);
            iv
        }
    };

    let sealed = credential::encrypt(&secret, &token, &iv)?;
    Ok(format!(
        "X-Encrypted-Token: {}\nX-Token-IV: {}",
        sealed.ciphertext_b64, sealed.iv_hex
    ))
}

fn execute_config(file: &Path) -> Result<String, CliError> {
    let config = ServiceConfig::from_file(file)?;
    let secret = SharedSecret::from_optional(std::env::var(SECRET_ENV_VAR).ok());
    config.validate(secret.as_ref())?;

    serde_json::to_string_pretty(&config).map_err(|e| CliError::CommandFailed {
        message: format!("Failed to render configuration: {}", e),
    })
}

// ============================================================================
// Helpers
// ============================================================================

fn non_empty_env(name: &str) -> Result<String, CliError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CliError::MissingEnvironment {
            name: name.to_string(),
        })
}

fn secret_from_env(name: &str) -> Result<SharedSecret, CliError> {
    non_empty_env(name).map(SharedSecret::from)
}

fn parse_iv(value: &str) -> Result<[u8; credential::BLOCK_SIZE], CliError> {
    let bytes = hex::decode(value.trim()).map_err(|e| CliError::InvalidArgument {
        arg: "--iv".to_string(),
        message: e.to_string(),
    })?;

    bytes.try_into().map_err(|b: Vec<u8>| CliError::InvalidArgument {
        arg: "--iv".to_string(),
        message: format!("expected {} bytes, got {}", credential::BLOCK_SIZE, b.len()),
    })
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
