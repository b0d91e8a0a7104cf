//! # Ingestion Pipeline
//!
//! Runs one delivery through signature verification, credential recovery,
//! archiving, routing and the optional upstream call.
//!
//! ```text
//! Received -> SignatureChecked -> CredentialsExtracted -> Decrypted -> Routed -> Completed | Skipped
//! ```
//!
//! Any stage may fail; the error records where via [`PipelineError::stage`].
//! The shared secret, the derived key and the recovered credential are never
//! logged.

use crate::{
    archive::{ArchiveError, PayloadArchive},
    credential::{self, DecryptionError, DecryptionFailure, EncryptedCredential},
    routing::{EventPayload, EventRouter, MalformedPayloadError, RoutingDecision},
    signature,
    upstream::{UpstreamClient, UpstreamError},
    webhook::WebhookRequest,
    DecryptedCredential, SharedSecret,
};
use serde::Serialize;
use std::{fmt, sync::Arc};
use tracing::{debug, info, instrument, warn};

// ============================================================================
// Stages, Outcomes And Errors
// ============================================================================

/// Position of a delivery in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    SignatureChecked,
    CredentialsExtracted,
    Decrypted,
    Routed,
    Completed,
    Skipped,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::SignatureChecked => "signature_checked",
            Self::CredentialsExtracted => "credentials_extracted",
            Self::Decrypted => "decrypted",
            Self::Routed => "routed",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        };
        write!(f, "{}", name)
    }
}

/// Successful end state of a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Commits were fetched for a pull request.
    Completed { pr_number: u64, commits_count: usize },

    /// Acknowledged without upstream work. `event` is the payload action, or
    /// empty when there was none.
    Skipped { event: String },
}

impl PipelineOutcome {
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::Completed { .. } => PipelineStage::Completed,
            Self::Skipped { .. } => PipelineStage::Skipped,
        }
    }
}

/// Why a delivery failed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Webhook signature is invalid")]
    SignatureInvalid,

    #[error("Credential headers are missing or empty")]
    MissingCredentialHeaders,

    #[error("Credential could not be decrypted")]
    DecryptionFailed(#[source] DecryptionError),

    #[error("Payload is malformed: {0}")]
    MalformedPayload(#[from] MalformedPayloadError),

    #[error("Upstream call failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Payload archive failed: {0}")]
    Archive(#[from] ArchiveError),
}

impl PipelineError {
    /// The last stage the delivery reached before failing
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::SignatureInvalid => PipelineStage::Received,
            Self::MissingCredentialHeaders => PipelineStage::SignatureChecked,
            Self::DecryptionFailed(_) => PipelineStage::CredentialsExtracted,
            Self::Archive(_) => PipelineStage::Decrypted,
            Self::MalformedPayload(_) => PipelineStage::Decrypted,
            Self::Upstream(_) => PipelineStage::Routed,
        }
    }

    /// Whether the failure is the client's fault rather than ours
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::SignatureInvalid | Self::MissingCredentialHeaders | Self::DecryptionFailed(_)
        )
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Immutable, shareable processor for webhook deliveries.
pub struct IngestionPipeline {
    secret: Option<SharedSecret>,
    require_signature: bool,
    router: EventRouter,
    upstream: Arc<dyn UpstreamClient>,
    archive: Arc<dyn PayloadArchive>,
}

impl IngestionPipeline {
    /// Create a pipeline.
    ///
    /// `secret` is `None` when no shared secret is configured; signature
    /// checks are then skipped and every decryption fails.
    pub fn new(
        secret: Option<SharedSecret>,
        router: EventRouter,
        upstream: Arc<dyn UpstreamClient>,
        archive: Arc<dyn PayloadArchive>,
    ) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            require_signature: false,
            router,
            upstream,
            archive,
        }
    }

    /// Reject deliveries without a verifiable signature instead of
    /// accepting them.
    pub fn with_required_signature(mut self, required: bool) -> Self {
        self.require_signature = required;
        self
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    pub fn requires_signature(&self) -> bool {
        self.require_signature
    }

    /// Process one delivery to completion.
    #[instrument(skip(self, request), fields(request_id = %request.request_id))]
    pub async fn process(&self, request: WebhookRequest) -> Result<PipelineOutcome, PipelineError> {
        debug!(stage = %PipelineStage::Received, body_len = request.body.len(), "Webhook received");

        // 1. Authenticate the raw body
        self.check_signature(&request)?;
        debug!(stage = %PipelineStage::SignatureChecked, "Signature check passed");

        // 2. Both credential headers must be present before any decryption
        let encrypted = EncryptedCredential::from_headers(&request.headers).ok_or_else(|| {
            warn!("Credential headers missing");
            PipelineError::MissingCredentialHeaders
        })?;
        debug!(stage = %PipelineStage::CredentialsExtracted, "Credential headers extracted");

        // 3. Recover the credential
        let credential = self.decrypt(&encrypted)?;
        debug!(stage = %PipelineStage::Decrypted, "Credential decrypted");

        // 4. Parse and archive the payload
        let payload: serde_json::Value = serde_json::from_slice(&request.body).map_err(|e| {
            MalformedPayloadError::InvalidJson {
                message: e.to_string(),
            }
        })?;
        self.archive.store(&payload).await?;

        // 5. Route
        let event = EventPayload::from_value(&payload);
        let decision = self.router.route(&event)?;
        debug!(stage = %PipelineStage::Routed, decision = ?decision, "Payload routed");

        let outcome = match decision {
            RoutingDecision::FetchPrCommits {
                repo_full_name,
                pr_number,
            } => {
                let commits = self
                    .upstream
                    .fetch_pr_commits(&repo_full_name, pr_number, credential)
                    .await
                    .map_err(|e| {
                        warn!(error = %e, repo = %repo_full_name, pr_number, "Upstream call failed");
                        e
                    })?;

                PipelineOutcome::Completed {
                    pr_number,
                    commits_count: commits.len(),
                }
            }
            RoutingDecision::Ignore => {
                drop(credential);
                PipelineOutcome::Skipped {
                    event: event.action().unwrap_or_default().to_string(),
                }
            }
        };

        info!(stage = %outcome.stage(), outcome = ?outcome, "Webhook processed");
        Ok(outcome)
    }

    fn check_signature(&self, request: &WebhookRequest) -> Result<(), PipelineError> {
        match (&self.secret, request.signature()) {
            (Some(secret), Some(provided)) => {
                if signature::verify(secret, &request.body, provided) {
                    Ok(())
                } else {
                    warn!("Webhook signature mismatch");
                    Err(PipelineError::SignatureInvalid)
                }
            }
            _ if self.require_signature => {
                warn!(
                    secret_configured = self.secret.is_some(),
                    "Signature required but cannot be verified"
                );
                Err(PipelineError::SignatureInvalid)
            }
            (None, _) => {
                debug!("Signature check skipped - no secret configured");
                Ok(())
            }
            (Some(_), None) => {
                debug!("Signature check skipped - no signature supplied");
                Ok(())
            }
        }
    }

    fn decrypt(&self, encrypted: &EncryptedCredential) -> Result<DecryptedCredential, PipelineError> {
        let secret = self.secret.as_ref().ok_or_else(|| {
            warn!(reason = DecryptionFailure::MissingKeyMaterial.as_str(), "Credential decryption failed");
            PipelineError::DecryptionFailed(DecryptionError::new(DecryptionFailure::MissingKeyMaterial))
        })?;

        let outcome = credential::decrypt(secret, encrypted).map_err(|e| {
            warn!(reason = e.reason().as_str(), "Credential decryption failed");
            PipelineError::DecryptionFailed(e)
        })?;

        if outcome.used_fallback() {
            warn!("Credential padding invalid, recovered with NUL-truncation fallback");
        }

        Ok(outcome.into_credential())
    }
}

impl fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("secret", &self.secret)
            .field("require_signature", &self.require_signature)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
