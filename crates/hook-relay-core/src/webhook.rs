//! # Webhook Request Types
//!
//! Raw delivery data as handed over by the HTTP layer.

use crate::Timestamp;
use bytes::Bytes;
use std::collections::HashMap;
use uuid::Uuid;

/// Raw HTTP request data for one webhook delivery
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    /// Correlates log lines and the error body of this delivery
    pub request_id: Uuid,
    pub headers: WebhookHeaders,
    pub body: Bytes,
    pub received_at: Timestamp,
}

impl WebhookRequest {
    /// Create new webhook request with a fresh request id
    pub fn new(headers: WebhookHeaders, body: Bytes) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            headers,
            body,
            received_at: Timestamp::now(),
        }
    }

    /// Get signature from headers if present and non-empty
    pub fn signature(&self) -> Option<&str> {
        self.headers
            .get_non_empty(crate::signature::SIGNATURE_HEADER)
    }
}

/// Case-insensitive view over the delivery's HTTP headers.
///
/// Header names are lower-cased on construction; lookups lower-case the
/// requested name, so `X-Token-IV`, `x-token-iv` and `X-TOKEN-IV` are the
/// same header.
#[derive(Debug, Clone, Default)]
pub struct WebhookHeaders {
    values: HashMap<String, String>,
}

impl WebhookHeaders {
    /// Build from an HTTP header map with arbitrary name casing
    pub fn from_http_headers(headers: &HashMap<String, String>) -> Self {
        let values = headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
            .collect();
        Self { values }
    }

    /// Add or replace a header value
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Get a header value regardless of name casing
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Get a header value, treating an empty value as absent
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|value| !value.is_empty())
    }

    /// Number of headers
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if there are no headers
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for WebhookHeaders
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::default();
        for (name, value) in iter {
            headers.insert(name.as_ref(), value);
        }
        headers
    }
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
