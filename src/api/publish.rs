//! Publish endpoint
//!
//! POST /publish - Publish text plus media as a single post. The media
//! payload arrives either as a staging handle (canonical) or as inline
//! base64 (compatibility shim for callers already holding the bytes).

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{error_response, session_id, AppState, ErrorResponse};
use crate::pipeline::MediaSource;
use crate::twitter::PublishResult;

/// Publish request; exactly one of the media fields is expected
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub tweet_text: String,
    pub image_reference: Option<String>,
    pub base64_image: Option<String>,
}

/// Publish response
#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub success: bool,
    pub post: PublishResult,
}

/// Publish a post with media
pub(super) async fn publish(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PublishRequest>,
) -> Response {
    let session = session_id(&headers);

    // The staged reference wins when both fields are present
    let source = match (req.image_reference, req.base64_image) {
        (Some(handle), _) => MediaSource::Handle(handle),
        (None, Some(encoded)) => MediaSource::Inline(encoded),
        (None, None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "imageReference or base64Image is required".to_string(),
                }),
            )
                .into_response();
        }
    };

    match state
        .pipeline
        .publish(&session, &req.tweet_text, source)
        .await
    {
        Ok(post) => (
            StatusCode::OK,
            Json(PublishResponse {
                success: true,
                post,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}
