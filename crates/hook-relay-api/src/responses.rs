//! Response bodies returned by the HTTP endpoints.

use hook_relay_core::{PipelineOutcome, Timestamp};
use serde::Serialize;

/// Successful webhook response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum WebhookResponse {
    /// Commits were fetched for the pull request
    Processed {
        message: String,
        pr_number: u64,
        commits_count: usize,
    },

    /// Delivery accepted without upstream work
    Acknowledged { message: String, event: String },
}

impl From<PipelineOutcome> for WebhookResponse {
    fn from(outcome: PipelineOutcome) -> Self {
        match outcome {
            PipelineOutcome::Completed {
                pr_number,
                commits_count,
            } => Self::Processed {
                message: "PR processed".to_string(),
                pr_number,
                commits_count,
            },
            PipelineOutcome::Skipped { event } => Self::Acknowledged {
                message: "Webhook received".to_string(),
                event,
            },
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: Timestamp,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Timestamp::now(),
        }
    }
}
