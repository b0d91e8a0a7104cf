//! # Upstream API Client
//!
//! Authenticated follow-up calls to the external REST API, made with the
//! credential recovered from a delivery.
//!
//! The client is a trait so the pipeline can be exercised without a network;
//! [`GitHubUpstreamClient`] is the `reqwest` implementation.

use crate::credential::DecryptedCredential;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Media type requested from the API.
pub const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Upper bound on the error body kept for diagnostics, in characters.
pub const MAX_ERROR_BODY_CHARS: usize = 512;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the upstream client.
///
/// # Examples
///
/// ```
/// use hook_relay_core::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_api_base_url("http://localhost:8080")
///     .with_timeout(Duration::from_secs(2));
/// assert_eq!(config.timeout, Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API base URL, without trailing slash
    pub api_base_url: String,
    /// Whole-request timeout
    pub timeout: Duration,
    /// User agent sent with every request (required by GitHub)
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            timeout: Duration::from_secs(5),
            user_agent: format!("hook-relay/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Set the API base URL.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// One entry of the pull request commits listing. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    #[serde(default)]
    pub sha: Option<String>,

    #[serde(default)]
    pub commit: Option<CommitDetail>,
}

impl CommitRecord {
    /// The commit message, when the API returned one
    pub fn message(&self) -> Option<&str> {
        self.commit.as_ref().and_then(|c| c.message.as_deref())
    }
}

/// Nested `commit` object of a [`CommitRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDetail {
    #[serde(default)]
    pub message: Option<String>,
}

/// Commits of a pull request in API order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitList(Vec<CommitRecord>);

impl CommitList {
    pub fn new(commits: Vec<CommitRecord>) -> Self {
        Self(commits)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommitRecord> {
        self.0.iter()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors from the upstream API call.
///
/// Messages are for server-side logs; the HTTP layer never forwards them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// Non-2xx response. `body` is truncated to [`MAX_ERROR_BODY_CHARS`].
    #[error("Upstream returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Upstream request timed out")]
    Timeout,

    #[error("Upstream transport error: {0}")]
    Network(String),

    /// 2xx response whose body is not a JSON array of commit objects.
    #[error("Upstream response could not be parsed: {0}")]
    InvalidResponse(String),

    /// The credential cannot be carried in an HTTP header.
    #[error("Upstream request could not be built: {message}")]
    InvalidRequest { message: String },

    #[error("Upstream client configuration error: {message}")]
    Configuration { message: String },
}

impl UpstreamError {
    /// Check if this error represents a condition that may succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            Self::Timeout => true,
            Self::Network(_) => true,
            Self::InvalidResponse(_) => false,
            Self::InvalidRequest { .. } => false,
            Self::Configuration { .. } => false,
        }
    }

    fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(error.to_string())
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Interface for fetching data from the upstream API.
///
/// Implementations take the credential by value and must not retain it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// List the commits of pull request `pr_number` in `repo_full_name`
    /// (`owner/name`).
    async fn fetch_pr_commits(
        &self,
        repo_full_name: &str,
        pr_number: u64,
        credential: DecryptedCredential,
    ) -> Result<CommitList, UpstreamError>;
}

/// `reqwest`-backed client for the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubUpstreamClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl GitHubUpstreamClient {
    /// Build a client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Configuration`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(config: ClientConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| UpstreamError::Configuration {
                message: e.to_string(),
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn commits_url(&self, repo_full_name: &str, pr_number: u64) -> String {
        format!(
            "{}/repos/{}/pulls/{}/commits",
            self.config.api_base_url.trim_end_matches('/'),
            repo_full_name,
            pr_number
        )
    }

    fn auth_headers(credential: &DecryptedCredential) -> Result<HeaderMap, UpstreamError> {
        let mut authorization = HeaderValue::from_str(credential.expose_secret()).map_err(|_| {
            UpstreamError::InvalidRequest {
                message: "credential contains characters not allowed in a header".to_string(),
            }
        })?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        Ok(headers)
    }
}

#[async_trait]
impl UpstreamClient for GitHubUpstreamClient {
    #[instrument(skip(self, credential), fields(repo = %repo_full_name, pr = pr_number))]
    async fn fetch_pr_commits(
        &self,
        repo_full_name: &str,
        pr_number: u64,
        credential: DecryptedCredential,
    ) -> Result<CommitList, UpstreamError> {
        let url = self.commits_url(repo_full_name, pr_number);
        let headers = Self::auth_headers(&credential)?;
        drop(credential);

        debug!(url = %url, "Fetching pull request commits");

        let response = self
            .client
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(UpstreamError::from_transport)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(UpstreamError::from_transport)?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Upstream returned error status");
            return Err(UpstreamError::HttpStatus {
                status: status.as_u16(),
                body: truncate_chars(&body, MAX_ERROR_BODY_CHARS),
            });
        }

        let commits: Vec<CommitRecord> = serde_json::from_str(&body)
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;

        debug!(commits = commits.len(), "Fetched pull request commits");
        Ok(CommitList::new(commits))
    }
}

/// Keep at most `max` characters of `text`.
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
#[path = "upstream_tests.rs"]
mod tests;
