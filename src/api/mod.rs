//! HTTP API module - process-boundary endpoints
//!
//! The presentation layer only calls these routes and renders the results;
//! all sequencing and failure handling lives in the pipeline.

mod generate;
mod media;
mod publish;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::media::StagingStore;
use crate::openai::GenerateError;
use crate::pipeline::{Pipeline, PipelineError};
use crate::twitter::PublishError;

/// Header selecting the pipeline session; absent means the default session
pub const SESSION_HEADER: &str = "x-session";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub store: StagingStore,
}

/// Build the API router
pub fn router(pipeline: Arc<Pipeline>, store: StagingStore) -> Router {
    let state = AppState { pipeline, store };

    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .route("/state", get(session_state))
        .route("/generate", post(generate::generate))
        .route("/publish", post(publish::publish))
        .route("/media/{handle}", get(media::get_media))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Session id from the request headers
fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("default")
        .to_string()
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map a pipeline failure onto an HTTP status, keeping the specific error
/// message intact
fn error_response(err: PipelineError) -> Response {
    let status = match &err {
        PipelineError::InvalidState(_) => StatusCode::CONFLICT,
        PipelineError::Generate(GenerateError::InvalidInput) => StatusCode::BAD_REQUEST,
        PipelineError::Publish(PublishError::MediaNotFound(_)) => StatusCode::NOT_FOUND,
        PipelineError::Publish(PublishError::InvalidPayload(_)) => StatusCode::BAD_REQUEST,
        PipelineError::Publish(PublishError::Auth(_)) => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "postd",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                staging: "ok",
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                staging: "error",
            }),
        ),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    staging: &'static str,
}

/// Current pipeline state for the caller's session
async fn session_state(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    Json(state.pipeline.state(&session_id(&headers)))
}
