//! Tests for HTTP error mapping.

use super::*;
use hook_relay_core::{routing::MalformedPayloadError, ArchiveError, UpstreamError};

fn status_of(error: PipelineError) -> (StatusCode, &'static str) {
    WebhookHandlerError::processing(Uuid::new_v4(), error).status_and_message()
}

#[test]
fn test_client_failures_map_to_forbidden() {
    assert_eq!(
        status_of(PipelineError::SignatureInvalid),
        (StatusCode::FORBIDDEN, "Invalid signature")
    );
    assert_eq!(
        status_of(PipelineError::MissingCredentialHeaders),
        (StatusCode::FORBIDDEN, "Missing token encryption headers")
    );
}

#[test]
fn test_upstream_failure_maps_to_fetch_error() {
    let error = PipelineError::Upstream(UpstreamError::Timeout);

    assert_eq!(
        status_of(error),
        (StatusCode::INTERNAL_SERVER_ERROR, "Error fetching PR commits")
    );
}

#[test]
fn test_internal_failures_use_generic_message() {
    let malformed = PipelineError::MalformedPayload(MalformedPayloadError::InvalidJson {
        message: "expected value at line 1".to_string(),
    });
    let archive = PipelineError::Archive(ArchiveError::Io {
        path: "/var/lib/payload.json".to_string(),
        message: "permission denied".to_string(),
    });

    for error in [malformed, archive] {
        assert_eq!(
            status_of(error),
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        );
    }
}

#[tokio::test]
async fn test_response_body_shape() {
    let request_id = Uuid::new_v4();
    let response = WebhookHandlerError::processing(
        request_id,
        PipelineError::Archive(ArchiveError::Serialization {
            message: "database password is hunter2".to_string(),
        }),
    )
    .into_response();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(body["error"], "Internal server error");
    assert_eq!(body["status"], 500);
    assert_eq!(body["request_id"], request_id.to_string());
    assert!(body["timestamp"].as_str().is_some());
    assert!(!body.to_string().contains("hunter2"));
}

#[test]
fn test_service_error_exit_codes() {
    let bind = ServiceError::BindFailed {
        address: "0.0.0.0:80".to_string(),
        message: "permission denied".to_string(),
    };
    let server = ServiceError::ServerFailed {
        message: "boom".to_string(),
    };
    let config = ServiceError::Configuration(ConfigError::Missing {
        key: "WEBHOOK_SECRET".to_string(),
    });

    assert_eq!(bind.exit_code(), 1);
    assert_eq!(server.exit_code(), 2);
    assert_eq!(config.exit_code(), 3);
}
