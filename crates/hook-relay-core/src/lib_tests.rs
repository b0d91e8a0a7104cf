//! Tests for shared core types.

use super::*;

#[test]
fn test_shared_secret_debug_is_redacted() {
    let secret = SharedSecret::from("super-secret-value");
    let debug = format!("{:?}", secret);

    assert!(debug.contains("[REDACTED]"));
    assert!(!debug.contains("super-secret-value"));
    assert!(debug.contains("18"), "length should be reported: {debug}");
}

#[test]
fn test_shared_secret_from_optional() {
    assert!(SharedSecret::from_optional(None).is_none());
    assert!(SharedSecret::from_optional(Some(String::new())).is_none());

    let secret = SharedSecret::from_optional(Some("abc".to_string())).unwrap();
    assert_eq!(secret.expose_bytes(), b"abc");
    assert_eq!(secret.len(), 3);
    assert!(!secret.is_empty());
}

#[test]
fn test_timestamp_display_is_rfc3339() {
    let ts = Timestamp::now();
    let rendered = ts.to_string();

    assert_eq!(rendered, ts.to_rfc3339());
    assert!(chrono::DateTime::parse_from_rfc3339(&rendered).is_ok());
}

#[test]
fn test_validation_error_messages() {
    let err = ValidationError::Required {
        field: "iv".to_string(),
    };
    assert_eq!(err.to_string(), "Field 'iv' is required");

    let err = ValidationError::InvalidFormat {
        field: "iv".to_string(),
        message: "must be 16 bytes".to_string(),
    };
    assert!(err.to_string().contains("must be 16 bytes"));
}
