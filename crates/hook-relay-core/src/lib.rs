//! # Hook-Relay Core
//!
//! Domain logic for the Hook-Relay webhook ingestion pipeline.
//!
//! An inbound delivery is authenticated with an HMAC-SHA256 signature, a
//! bearer credential delivered alongside it in encrypted form is recovered,
//! and, for pull request synchronisation events, that credential is used to
//! fetch the pull request's commits from the upstream REST API.
//!
//! ## Architecture
//!
//! - [`signature`] - constant-time webhook signature verification
//! - [`credential`] - AES-256-CBC credential recovery with lenient unpadding
//! - [`routing`] - decides whether a payload needs upstream work
//! - [`upstream`] - authenticated calls to the external API
//! - [`archive`] - persistence of the decoded payload for audit/replay
//! - [`pipeline`] - orchestrates the above for one request
//!
//! Infrastructure (the HTTP client, the archive location) sits behind traits
//! and is injected when the pipeline is constructed.
//!
//! ## Usage
//!
//! ```rust
//! use hook_relay_core::{signature, SharedSecret};
//!
//! let secret = SharedSecret::from("It's a Secret to Everybody");
//! let body = b"Hello, World!";
//! let header = signature::sign(&secret, body);
//! assert!(signature::verify(&secret, body, &header));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

pub mod archive;
pub mod credential;
pub mod pipeline;
pub mod routing;
pub mod signature;
pub mod upstream;
pub mod webhook;

pub use archive::{ArchiveError, FilesystemPayloadArchive, PayloadArchive};
pub use credential::{DecryptedCredential, DecryptionError, DecryptionOutcome, EncryptedCredential};
pub use pipeline::{IngestionPipeline, PipelineError, PipelineOutcome, PipelineStage};
pub use routing::{EventPayload, EventRouter, MalformedPayloadError, RoutingDecision, TriggerPolicy};
pub use upstream::{
    ClientConfig, CommitList, CommitRecord, GitHubUpstreamClient, UpstreamClient, UpstreamError,
};
pub use webhook::{WebhookHeaders, WebhookRequest};

// ============================================================================
// Shared Secret
// ============================================================================

/// Process-wide secret shared with the webhook producer.
///
/// Used both to verify delivery signatures and to derive the credential
/// decryption key. The bytes live in zeroizing memory and are never
/// included in `Debug` output.
#[derive(Clone)]
pub struct SharedSecret {
    inner: Zeroizing<Vec<u8>>,
}

impl SharedSecret {
    /// Create a secret from raw bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            inner: Zeroizing::new(bytes),
        }
    }

    /// Create a secret from an optional configuration value.
    ///
    /// Returns `None` when the value is absent or empty, which callers treat
    /// as "no secret configured".
    pub fn from_optional(value: Option<String>) -> Option<Self> {
        value.filter(|v| !v.is_empty()).map(Self::from)
    }

    /// Expose the secret bytes (only for immediate use in a MAC or KDF)
    pub fn expose_bytes(&self) -> &[u8] {
        &self.inner
    }

    /// Get secret length without exposing content
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if secret is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<String> for SharedSecret {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

impl From<&str> for SharedSecret {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecret")
            .field("length", &self.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Supporting Types
// ============================================================================

/// UTC timestamp with consistent formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

/// Error type for input validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
