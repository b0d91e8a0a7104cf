//! # Event Routing
//!
//! Decides whether a verified delivery needs upstream work.
//!
//! Only pull request synchronisation triggers a commit fetch. Two trigger
//! policies exist because the gate historically used by the producer-side
//! deployment is narrower than it looks:
//!
//! - [`TriggerPolicy::Literal`] (default): the action must equal
//!   `synchronize` before the `{opened, synchronize, reopened}` membership
//!   check runs, so `opened` and `reopened` never trigger.
//! - [`TriggerPolicy::AnyPullRequestAction`]: any of the three actions
//!   triggers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The action that opens the outer gate under the literal policy.
pub const SYNCHRONIZE_ACTION: &str = "synchronize";

/// Pull request actions accepted by the inner gate.
pub const PULL_REQUEST_TRIGGER_ACTIONS: [&str; 3] = ["opened", "synchronize", "reopened"];

// ============================================================================
// Payload
// ============================================================================

/// Typed optional-field view over an untrusted event payload.
///
/// Fields of the wrong JSON type are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPayload {
    action: Option<String>,
    repository_full_name: Option<String>,
    pull_request_number: Option<u64>,
}

impl EventPayload {
    /// Extract the fields routing needs from a JSON payload
    pub fn from_value(payload: &Value) -> Self {
        let action = payload
            .get("action")
            .and_then(|a| a.as_str())
            .map(String::from);

        let repository_full_name = payload
            .get("repository")
            .and_then(|r| r.get("full_name"))
            .and_then(|n| n.as_str())
            .map(String::from);

        let pull_request_number = payload
            .get("pull_request")
            .and_then(|pr| pr.get("number"))
            .and_then(|n| n.as_u64());

        Self {
            action,
            repository_full_name,
            pull_request_number,
        }
    }

    /// The `action` field, if it is a string
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// `repository.full_name`, or an error naming the missing field
    pub fn repository_full_name(&self) -> Result<&str, MalformedPayloadError> {
        self.repository_full_name
            .as_deref()
            .ok_or_else(|| MalformedPayloadError::missing("repository.full_name"))
    }

    /// `pull_request.number`, or an error naming the missing field
    pub fn pull_request_number(&self) -> Result<u64, MalformedPayloadError> {
        self.pull_request_number
            .ok_or_else(|| MalformedPayloadError::missing("pull_request.number"))
    }
}

// ============================================================================
// Decisions And Errors
// ============================================================================

/// What the pipeline should do with a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Acknowledge without further work.
    Ignore,

    /// Fetch the commits of the given pull request.
    FetchPrCommits {
        repo_full_name: String,
        pr_number: u64,
    },
}

/// Which pull request actions trigger a commit fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolicy {
    /// Only `synchronize` triggers.
    #[default]
    Literal,

    /// `opened`, `synchronize` and `reopened` all trigger.
    AnyPullRequestAction,
}

impl fmt::Display for TriggerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal => write!(f, "literal"),
            Self::AnyPullRequestAction => write!(f, "any_pull_request_action"),
        }
    }
}

/// A field required for the routing decision is missing or mistyped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedPayloadError {
    #[error("Required payload field missing: {field}")]
    MissingField { field: String },

    #[error("Payload is not valid JSON: {message}")]
    InvalidJson { message: String },
}

impl MalformedPayloadError {
    fn missing(field: &str) -> Self {
        Self::MissingField {
            field: field.to_string(),
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Maps event payloads to [`RoutingDecision`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventRouter {
    policy: TriggerPolicy,
}

impl EventRouter {
    /// Create a router with the given trigger policy
    pub fn new(policy: TriggerPolicy) -> Self {
        Self { policy }
    }

    /// The active trigger policy
    pub fn policy(&self) -> TriggerPolicy {
        self.policy
    }

    /// Decide what to do with `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedPayloadError::MissingField`] when the action
    /// triggers a fetch but the repository name or pull request number is
    /// absent.
    pub fn route(&self, payload: &EventPayload) -> Result<RoutingDecision, MalformedPayloadError> {
        let action = payload.action().unwrap_or_default();

        if !self.passes_outer_gate(action) {
            return Ok(RoutingDecision::Ignore);
        }

        if !PULL_REQUEST_TRIGGER_ACTIONS.contains(&action) {
            return Ok(RoutingDecision::Ignore);
        }

        let repo_full_name = payload.repository_full_name()?.to_string();
        let pr_number = payload.pull_request_number()?;

        Ok(RoutingDecision::FetchPrCommits {
            repo_full_name,
            pr_number,
        })
    }

    fn passes_outer_gate(&self, action: &str) -> bool {
        match self.policy {
            TriggerPolicy::Literal => action == SYNCHRONIZE_ACTION,
            TriggerPolicy::AnyPullRequestAction => true,
        }
    }
}

#[cfg(test)]
#[path = "routing_tests.rs"]
mod tests;
