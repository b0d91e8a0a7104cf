//! Recovery of the encrypted bearer credential delivered with a webhook.
//!
//! The producer encrypts the credential with AES-256-CBC under a key derived
//! from the shared secret and sends it in two headers:
//!
//! | Header | Encoding | Content |
//! |--------|----------|---------|
//! | `X-Encrypted-Token` | standard base64 | ciphertext |
//! | `X-Token-IV` | hex | 16-byte initialization vector |
//!
//! # Key derivation
//!
//! The key is `SHA-256(secret)`. The producer computes the digest as a hex
//! string and hex-decodes it again before use; that round trip yields the
//! raw 32-byte digest, which is what is fed to AES-256 here.
//!
//! # Padding recovery
//!
//! PKCS#7 padding is removed when it is valid. Some producers null-pad
//! instead, so when PKCS#7 removal fails the plaintext is cut at the first
//! NUL byte, or used unmodified if it contains none. Which path was taken is
//! reported through [`DecryptionOutcome`].
//!
//! # Errors
//!
//! Every failure is reported as the same opaque [`DecryptionError`]. Its
//! `Display` output carries no detail so it can be surfaced to a client
//! without turning the endpoint into a padding or format oracle.

use crate::{webhook::WebhookHeaders, SharedSecret, ValidationError};
use aes::cipher::{
    block_padding::{NoPadding, Pkcs7, RawPadding},
    BlockDecryptMut, BlockEncryptMut, KeyIvInit,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Header carrying the base64 ciphertext.
pub const ENCRYPTED_TOKEN_HEADER: &str = "x-encrypted-token";

/// Header carrying the hex initialization vector.
pub const TOKEN_IV_HEADER: &str = "x-token-iv";

// ============================================================================
// Types
// ============================================================================

/// Ciphertext and IV as received in the delivery headers.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedCredential {
    pub ciphertext_b64: String,
    pub iv_hex: String,
}

impl EncryptedCredential {
    /// Create from already-encoded parts
    pub fn new(ciphertext_b64: impl Into<String>, iv_hex: impl Into<String>) -> Self {
        Self {
            ciphertext_b64: ciphertext_b64.into(),
            iv_hex: iv_hex.into(),
        }
    }

    /// Extract both parts from the delivery headers.
    ///
    /// Returns `None` unless both headers are present and non-empty.
    pub fn from_headers(headers: &WebhookHeaders) -> Option<Self> {
        let ciphertext = headers.get_non_empty(ENCRYPTED_TOKEN_HEADER)?;
        let iv = headers.get_non_empty(TOKEN_IV_HEADER)?;
        Some(Self::new(ciphertext, iv))
    }
}

impl fmt::Debug for EncryptedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedCredential")
            .field("ciphertext_len", &self.ciphertext_b64.len())
            .field("iv_len", &self.iv_hex.len())
            .finish()
    }
}

/// Plaintext bearer credential.
///
/// Never empty. Held in zeroizing memory, not `Clone`, not `Display`, and
/// redacted in `Debug`, so it cannot be copied into logs or caches by
/// accident. Consumers take it by value and drop it when done.
pub struct DecryptedCredential {
    inner: Zeroizing<String>,
}

impl DecryptedCredential {
    pub(crate) fn new(value: String) -> Self {
        Self {
            inner: Zeroizing::new(value),
        }
    }

    /// Get the credential (only for immediate use in a request header)
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }

    /// Get credential length without exposing content
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if credential is empty (never true for a decrypted credential)
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for DecryptedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedCredential")
            .field("length", &self.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Result of a successful decryption.
#[derive(Debug)]
pub enum DecryptionOutcome {
    /// PKCS#7 padding was valid and removed.
    Standard(DecryptedCredential),

    /// PKCS#7 removal failed; the buffer was cut at the first NUL byte or
    /// used as-is.
    PaddingFallback(DecryptedCredential),
}

impl DecryptionOutcome {
    /// Whether the lenient unpadding path was used
    pub fn used_fallback(&self) -> bool {
        matches!(self, Self::PaddingFallback(_))
    }

    /// Take the credential, discarding how it was recovered
    pub fn into_credential(self) -> DecryptedCredential {
        match self {
            Self::Standard(credential) | Self::PaddingFallback(credential) => credential,
        }
    }
}

/// Why decryption failed. Only for server-side diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptionFailure {
    MissingKeyMaterial,
    InvalidIvEncoding,
    InvalidIvLength,
    InvalidCiphertextEncoding,
    EmptyCiphertext,
    CiphertextNotBlockAligned,
    CipherFailure,
    InvalidUtf8,
    EmptyPlaintext,
}

impl DecryptionFailure {
    /// Short machine-readable label for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingKeyMaterial => "missing_key_material",
            Self::InvalidIvEncoding => "invalid_iv_encoding",
            Self::InvalidIvLength => "invalid_iv_length",
            Self::InvalidCiphertextEncoding => "invalid_ciphertext_encoding",
            Self::EmptyCiphertext => "empty_ciphertext",
            Self::CiphertextNotBlockAligned => "ciphertext_not_block_aligned",
            Self::CipherFailure => "cipher_failure",
            Self::InvalidUtf8 => "invalid_utf8",
            Self::EmptyPlaintext => "empty_plaintext",
        }
    }
}

/// Opaque credential decryption failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("credential decryption failed")]
pub struct DecryptionError {
    reason: DecryptionFailure,
}

impl DecryptionError {
    pub(crate) fn new(reason: DecryptionFailure) -> Self {
        Self { reason }
    }

    /// Failure kind, for server-side logs only.
    pub fn reason(&self) -> DecryptionFailure {
        self.reason
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Derive the AES-256 key from the shared secret.
pub fn derive_key(secret: &SharedSecret) -> Zeroizing<[u8; 32]> {
    let digest = Sha256::digest(secret.expose_bytes());
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&digest);
    key
}

/// Decrypt a delivered credential.
///
/// # Errors
///
/// Returns [`DecryptionError`] when the IV is not 16 bytes of hex, the
/// ciphertext is not non-empty block-aligned base64, or the recovered bytes
/// are not non-empty UTF-8.
pub fn decrypt(
    secret: &SharedSecret,
    encrypted: &EncryptedCredential,
) -> Result<DecryptionOutcome, DecryptionError> {
    let key = derive_key(secret);

    let iv = hex::decode(encrypted.iv_hex.trim())
        .map_err(|_| DecryptionError::new(DecryptionFailure::InvalidIvEncoding))?;
    if iv.len() != BLOCK_SIZE {
        return Err(DecryptionError::new(DecryptionFailure::InvalidIvLength));
    }

    let ciphertext = BASE64
        .decode(encrypted.ciphertext_b64.trim())
        .map_err(|_| DecryptionError::new(DecryptionFailure::InvalidCiphertextEncoding))?;
    if ciphertext.is_empty() {
        return Err(DecryptionError::new(DecryptionFailure::EmptyCiphertext));
    }
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(DecryptionError::new(
            DecryptionFailure::CiphertextNotBlockAligned,
        ));
    }

    let cipher = Aes256CbcDec::new_from_slices(key.as_slice(), &iv)
        .map_err(|_| DecryptionError::new(DecryptionFailure::CipherFailure))?;
    let buffer = Zeroizing::new(
        cipher
            .decrypt_padded_vec_mut::<NoPadding>(&ciphertext)
            .map_err(|_| DecryptionError::new(DecryptionFailure::CipherFailure))?,
    );

    let (plaintext, fallback) = match strip_pkcs7(&buffer) {
        Some(unpadded) => (unpadded, false),
        None => (truncate_at_nul(&buffer), true),
    };

    let text = std::str::from_utf8(plaintext)
        .map_err(|_| DecryptionError::new(DecryptionFailure::InvalidUtf8))?;
    if text.is_empty() {
        return Err(DecryptionError::new(DecryptionFailure::EmptyPlaintext));
    }

    let credential = DecryptedCredential::new(text.to_owned());
    if fallback {
        Ok(DecryptionOutcome::PaddingFallback(credential))
    } else {
        Ok(DecryptionOutcome::Standard(credential))
    }
}

/// Encrypt a credential the way the producer does (AES-256-CBC, PKCS#7).
///
/// # Errors
///
/// Returns [`ValidationError`] when the IV is not 16 bytes or the plaintext
/// is empty.
pub fn encrypt(
    secret: &SharedSecret,
    plaintext: &str,
    iv: &[u8],
) -> Result<EncryptedCredential, ValidationError> {
    if plaintext.is_empty() {
        return Err(ValidationError::Required {
            field: "plaintext".to_string(),
        });
    }
    if iv.len() != BLOCK_SIZE {
        return Err(ValidationError::InvalidFormat {
            field: "iv".to_string(),
            message: format!("must be {} bytes, got {}", BLOCK_SIZE, iv.len()),
        });
    }

    let key = derive_key(secret);
    let cipher = Aes256CbcEnc::new_from_slices(key.as_slice(), iv).map_err(|_| {
        ValidationError::InvalidFormat {
            field: "iv".to_string(),
            message: "rejected by cipher".to_string(),
        }
    })?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    Ok(EncryptedCredential::new(
        BASE64.encode(ciphertext),
        hex::encode(iv),
    ))
}

/// Remove PKCS#7 padding, or `None` if the padding is not valid.
fn strip_pkcs7(buffer: &[u8]) -> Option<&[u8]> {
    let tail_start = buffer.len().checked_sub(BLOCK_SIZE)?;
    let unpadded = Pkcs7::raw_unpad(&buffer[tail_start..]).ok()?;
    Some(&buffer[..tail_start + unpadded.len()])
}

/// Cut at the first NUL byte; the whole buffer if there is none.
fn truncate_at_nul(buffer: &[u8]) -> &[u8] {
    match buffer.iter().position(|&b| b == 0) {
        Some(end) => &buffer[..end],
        None => buffer,
    }
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
