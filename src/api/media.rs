//! Staged media serving endpoint
//!
//! GET /media/{handle} - Serve a staged image for preview

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
};

use super::AppState;
use crate::media::StagingError;

/// Serve staged bytes by handle
pub(super) async fn get_media(
    Path(handle): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.store.get(&handle).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "image/png".to_string()),
                // Handles disappear once published or swept
                (header::CACHE_CONTROL, "private, no-store".to_string()),
            ],
            bytes,
        )
            .into_response(),
        Err(StagingError::NotFound(_)) | Err(StagingError::InvalidHandle(_)) => {
            (StatusCode::NOT_FOUND, "Media not found").into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response(),
    }
}
