//! Image generation service client
//!
//! Talks to an OpenAI-compatible `images/generations` endpoint. The service
//! does not return bytes directly; it returns a short-lived URL which must be
//! dereferenced once, immediately, before it expires.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ImageConfig;
use crate::media::StagingError;

/// Image generation errors
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("prompt must not be empty")]
    InvalidInput,

    #[error("image API key not configured")]
    NotConfigured,

    #[error("image service rejected request: {0}")]
    UpstreamRejected(String),

    #[error("image transfer failed: {0}")]
    TransferFailed(String),

    #[error(transparent)]
    Staging(#[from] StagingError),
}

/// Image generation request
#[derive(Debug, Serialize)]
struct ImageRequest {
    model: String,
    prompt: String,
    n: u32,
    size: String,
}

/// Image generation response
#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageUrl>,
}

#[derive(Debug, Deserialize)]
struct ImageUrl {
    url: Option<String>,
}

/// Client for the image generation service
#[derive(Debug)]
pub struct OpenAiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    size: String,
}

impl OpenAiClient {
    /// Create a client from config
    pub fn new(config: &ImageConfig, timeout: Duration) -> Self {
        Self {
            client: Client::builder().timeout(timeout).build().unwrap(),
            api_key: config.api_key.clone(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            size: config.size.clone(),
        }
    }

    /// Check if API key is configured
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a single image and return its bytes
    ///
    /// Single attempt; retry policy belongs to the caller.
    pub async fn generate(&self, prompt: &str) -> Result<Vec<u8>, GenerateError> {
        let api_key = self.api_key.as_ref().ok_or(GenerateError::NotConfigured)?;

        let request = ImageRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            n: 1,
            size: self.size.clone(),
        };

        debug!("Requesting image generation from {}", self.base_url);

        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerateError::UpstreamRejected(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Image service error: {} - {}", status, body);
            return Err(GenerateError::UpstreamRejected(format!(
                "{}: {}",
                status,
                body.trim()
            )));
        }

        let image_response: ImageResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::UpstreamRejected(format!("unparseable response: {}", e)))?;

        let url = image_response
            .data
            .first()
            .and_then(|d| d.url.clone())
            .ok_or_else(|| GenerateError::UpstreamRejected("no image URL in response".into()))?;

        self.fetch_image(&url).await
    }

    /// Dereference the transient image URL and return the bytes
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, GenerateError> {
        debug!("Fetching generated image from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GenerateError::TransferFailed(format!("fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GenerateError::TransferFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GenerateError::TransferFailed(format!("read failed: {}", e)))?;

        Ok(bytes.to_vec())
    }
}
