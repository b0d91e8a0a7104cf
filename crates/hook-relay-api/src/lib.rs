//! # Hook-Relay HTTP Service
//!
//! HTTP layer hosting the Hook-Relay ingestion pipeline.
//!
//! This library provides:
//! - The webhook endpoint (`POST {webhook.endpoint_path}`)
//! - A liveness endpoint (`GET /health`)
//! - Mapping of pipeline failures to HTTP status codes and generic bodies
//! - Server start-up with graceful shutdown on SIGINT/SIGTERM

pub mod config;
pub mod errors;
pub mod responses;

pub use config::{
    ConfigSources, LoggingConfig, ServerConfig, ServiceConfig, UpstreamConfig, WebhookConfig,
    CONFIG_FILE_ENV_VAR, ENV_PREFIX, SECRET_ENV_VAR,
};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use responses::{HealthResponse, WebhookResponse};

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use hook_relay_core::{
    EventRouter, FilesystemPayloadArchive, GitHubUpstreamClient, IngestionPipeline, SharedSecret,
    WebhookHeaders, WebhookRequest,
};
use std::{any::Any, collections::HashMap, future::Future, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Path of the liveness endpoint.
pub const HEALTH_PATH: &str = "/health";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Pipeline processing each delivery
    pub pipeline: Arc<IngestionPipeline>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ServiceConfig, pipeline: IngestionPipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Wire the production pipeline from configuration.
///
/// The upstream client talks to `upstream.api_base_url` and the archive
/// writes to `webhook.archive_path`.
pub fn build_pipeline(
    config: &ServiceConfig,
    secret: Option<SharedSecret>,
) -> Result<IngestionPipeline, ServiceError> {
    let upstream = GitHubUpstreamClient::new(config.upstream.client_config()).map_err(|e| {
        ServiceError::Configuration(ConfigError::Invalid {
            message: e.to_string(),
        })
    })?;
    let archive = FilesystemPayloadArchive::new(config.webhook.archive_path.clone());

    Ok(IngestionPipeline::new(
        secret,
        EventRouter::new(config.webhook.trigger_policy),
        Arc::new(upstream),
        Arc::new(archive),
    )
    .with_required_signature(config.webhook.require_signature))
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let max_body_size = state.config.server.max_body_size;

    Router::new()
        .route(&state.config.webhook.endpoint_path, post(handle_webhook))
        .route(HEALTH_PATH, get(handle_health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(DefaultBodyLimit::max(max_body_size))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server and run until SIGINT or SIGTERM
pub async fn start_server(
    config: ServiceConfig,
    pipeline: IngestionPipeline,
) -> Result<(), ServiceError> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: addr.clone(),
            message: e.to_string(),
        })?;

    info!(
        address = %addr,
        endpoint = %config.webhook.endpoint_path,
        "Starting HTTP server"
    );

    let state = AppState::new(config, pipeline);
    serve(listener, state, shutdown_signal()).await?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Serve on an already bound listener until `shutdown` resolves.
///
/// In-flight requests are allowed to finish once shutdown begins.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<(), ServiceError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Handle a webhook delivery
#[instrument(skip(state, headers, body))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookHandlerError> {
    // Opaque header bytes are kept (lossily) so a present header is never
    // mistaken for an absent one
    let header_map: HashMap<String, String> = headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_lowercase(),
                String::from_utf8_lossy(v.as_bytes()).into_owned(),
            )
        })
        .collect();

    let request = WebhookRequest::new(WebhookHeaders::from_http_headers(&header_map), body);
    let request_id = request.request_id;

    info!(request_id = %request_id, "Received webhook request");

    let outcome = state
        .pipeline
        .process(request)
        .await
        .map_err(|e| WebhookHandlerError::processing(request_id, e))?;

    Ok(Json(WebhookResponse::from(outcome)))
}

/// Liveness check
pub async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Convert a handler panic into the generic JSON 500 body
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    let request_id = Uuid::new_v4();
    error!(request_id = %request_id, panic = %detail, "Handler panicked");

    errors::error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error",
        request_id,
    )
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
