//! Image generation endpoint
//!
//! POST /generate - Generate an image from a prompt and stage it for preview

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{error_response, session_id, AppState};

/// Generation request
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
}

/// Generation response: a locator into the staging store plus the backing
/// filesystem path
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub image_url: String,
    pub full_path: String,
}

/// Generate an image and stage it
pub(super) async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GenerateRequest>,
) -> Response {
    let session = session_id(&headers);

    match state.pipeline.generate(&session, &req.prompt).await {
        Ok(staged) => (
            StatusCode::OK,
            Json(GenerateResponse {
                image_url: format!("/media/{}", staged.handle),
                full_path: staged.path.display().to_string(),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}
