//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use hook_relay_core::PipelineError;
use tracing::{error, warn};
use uuid::Uuid;

/// Webhook handler errors with HTTP status code mapping
///
/// | Pipeline failure | Status | Client message |
/// |------------------|--------|----------------|
/// | `SignatureInvalid` | 403 | `Invalid signature` |
/// | `MissingCredentialHeaders` | 403 | `Missing token encryption headers` |
/// | `DecryptionFailed` | 403 | `Token decryption failed` |
/// | `Upstream` | 500 | `Error fetching PR commits` |
/// | anything else | 500 | `Internal server error` |
///
/// Client messages are fixed strings. The underlying error is logged
/// server-side together with the request id that is also returned in the
/// body.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// Webhook processing pipeline failure
    #[error("Processing failed: {source}")]
    ProcessingFailed {
        request_id: Uuid,
        #[source]
        source: PipelineError,
    },
}

impl WebhookHandlerError {
    pub fn processing(request_id: Uuid, source: PipelineError) -> Self {
        Self::ProcessingFailed { request_id, source }
    }

    pub fn request_id(&self) -> Uuid {
        match self {
            Self::ProcessingFailed { request_id, .. } => *request_id,
        }
    }

    /// Status code and client-facing message
    pub fn status_and_message(&self) -> (StatusCode, &'static str) {
        match self {
            Self::ProcessingFailed { source, .. } => match source {
                PipelineError::SignatureInvalid => (StatusCode::FORBIDDEN, "Invalid signature"),
                PipelineError::MissingCredentialHeaders => {
                    (StatusCode::FORBIDDEN, "Missing token encryption headers")
                }
                PipelineError::DecryptionFailed(_) => {
                    (StatusCode::FORBIDDEN, "Token decryption failed")
                }
                PipelineError::Upstream(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "Error fetching PR commits")
                }
                PipelineError::MalformedPayload(_) | PipelineError::Archive(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
                }
            },
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        let request_id = self.request_id();

        // Log detailed error server-side but return generic message to client
        if status.is_server_error() {
            error!(request_id = %request_id, status = status.as_u16(), error = %self, "Webhook request failed");
        } else {
            warn!(request_id = %request_id, status = status.as_u16(), error = %self, "Webhook request rejected");
        }

        error_response(status, message, request_id)
    }
}

/// JSON error body shared by handler errors and the panic handler
pub fn error_response(status: StatusCode, message: &str, request_id: Uuid) -> Response {
    let body = serde_json::json!({
        "error": message,
        "status": status.as_u16(),
        "request_id": request_id.to_string(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status, Json(body)).into_response()
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl ServiceError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed { .. } => 2,
            Self::Configuration(_) => 3,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration loading failed: {0}")]
    Loading(#[from] ::config::ConfigError),
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
