//! Webhook signature verification.
//!
//! Deliveries carry an `X-Hub-Signature-256` header of the form
//! `sha256=<lowercase hex HMAC-SHA256 of the raw body>`. The expected header
//! value is computed from the shared secret and compared against the
//! supplied value using constant-time equality, so the time taken does not
//! depend on where the two values first differ.
//!
//! # Fail-open policy
//!
//! [`verify`] is the primitive. Whether verification runs at all is decided
//! by the pipeline: when no secret is configured, or the delivery carries no
//! signature header, the request is accepted unverified unless signatures
//! were made mandatory in configuration.

use crate::SharedSecret;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Name of the header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Prefix identifying the digest algorithm in the header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Compute the `sha256=<hex>` header value for `body`.
pub fn sign(secret: &SharedSecret, body: &[u8]) -> String {
    // HMAC accepts keys of any length, including empty ones.
    let mut mac = HmacSha256::new_from_slice(secret.expose_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// Verify that `provided_signature` is the signature of `body` under `secret`.
///
/// Returns `false` for any mismatch, including a value without the
/// `sha256=` prefix, non-hex content, uppercase hex, or the wrong length.
/// Never panics and never errors.
pub fn verify(secret: &SharedSecret, body: &[u8], provided_signature: &str) -> bool {
    let expected = sign(secret, body);
    constant_time_compare(expected.as_bytes(), provided_signature.as_bytes())
}

/// Compare two byte strings without short-circuiting on the first difference.
///
/// Lengths are compared first; the expected value always has the same
/// public length, so this reveals nothing about the digest.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
