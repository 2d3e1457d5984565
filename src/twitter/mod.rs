//! Social platform publish client
//!
//! Wraps the Twitter/X API: credential verification as a fast-fail check,
//! media upload against the v1.1 endpoint, and post creation against the v2
//! endpoint, matching the platform's v1.1-upload/v2-tweet split. Platform
//! error codes and messages are surfaced verbatim so a caller can tell bad
//! credentials from a duplicate post from an oversized upload.

mod oauth;

use std::time::Duration;

use reqwest::{multipart, Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::TwitterConfig;
pub use oauth::Credentials;

/// Publish failure modes
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("staged media not found: {0}")]
    MediaNotFound(String),

    #[error("invalid inline image payload: {0}")]
    InvalidPayload(String),

    #[error("credential verification failed: {0}")]
    Auth(String),

    #[error("media upload failed: {0}")]
    Upload(String),

    #[error("post creation failed: {0}")]
    Post(String),
}

/// A published post, immutable once returned
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResult {
    pub platform_post_id: String,
    pub media_reference: String,
}

/// Client for the social platform API
#[derive(Debug)]
pub struct TwitterClient {
    client: Client,
    creds: Option<Credentials>,
    api_url: String,
    upload_url: String,
}

impl TwitterClient {
    /// Create a client from config. Credentials stay unset unless all four
    /// secrets are present.
    pub fn new(config: &TwitterConfig, timeout: Duration) -> Self {
        let creds = match (
            &config.api_key,
            &config.api_secret,
            &config.access_token,
            &config.access_token_secret,
        ) {
            (Some(key), Some(secret), Some(token), Some(token_secret)) => Some(Credentials {
                consumer_key: key.clone(),
                consumer_secret: secret.clone(),
                access_token: token.clone(),
                access_token_secret: token_secret.clone(),
            }),
            _ => None,
        };

        Self {
            client: Client::builder().timeout(timeout).build().unwrap(),
            creds,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            upload_url: config.upload_url.trim_end_matches('/').to_string(),
        }
    }

    /// Check if credentials are configured
    pub fn is_configured(&self) -> bool {
        self.creds.is_some()
    }

    fn creds(&self) -> Result<&Credentials, PublishError> {
        self.creds
            .as_ref()
            .ok_or_else(|| PublishError::Auth("platform credentials not configured".to_string()))
    }

    /// Verify credentials before uploading anything. Returns the account's
    /// screen name.
    pub async fn verify_credentials(&self) -> Result<String, PublishError> {
        let creds = self.creds()?;
        let url = format!("{}/1.1/account/verify_credentials.json", self.api_url);
        let auth = oauth::authorization_header(creds, "GET", &url, &[]);

        let response = self
            .client
            .get(&url)
            .header("Authorization", auth)
            .send()
            .await
            .map_err(|e| PublishError::Auth(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Credential verification failed: {} - {}", status, body);
            return Err(PublishError::Auth(platform_detail(status, &body)));
        }

        #[derive(Deserialize)]
        struct VerifyResponse {
            screen_name: String,
        }

        let verified: VerifyResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Auth(format!("unparseable response: {}", e)))?;

        debug!("Credentials verified for @{}", verified.screen_name);
        Ok(verified.screen_name)
    }

    /// Upload image bytes, returning the platform media reference
    pub async fn upload_media(&self, bytes: Vec<u8>) -> Result<String, PublishError> {
        let creds = self.creds()?;
        let url = format!("{}/1.1/media/upload.json", self.upload_url);
        // Multipart body parameters are excluded from the OAuth signature
        let auth = oauth::authorization_header(creds, "POST", &url, &[]);

        let size = bytes.len();
        let part = multipart::Part::bytes(bytes)
            .file_name("media.png")
            .mime_str("image/png")
            .map_err(|e| PublishError::Upload(format!("invalid media part: {}", e)))?;
        let form = multipart::Form::new().part("media", part);

        debug!("Uploading media ({} bytes)", size);

        let response = self
            .client
            .post(&url)
            .header("Authorization", auth)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PublishError::Upload(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Media upload rejected: {} - {}", status, body);
            return Err(PublishError::Upload(platform_detail(status, &body)));
        }

        #[derive(Deserialize)]
        struct UploadResponse {
            media_id_string: String,
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Upload(format!("unparseable response: {}", e)))?;

        debug!("Media uploaded, id {}", uploaded.media_id_string);
        Ok(uploaded.media_id_string)
    }

    /// Create the post, attaching an uploaded media reference
    pub async fn post_tweet(
        &self,
        text: &str,
        media_id: &str,
    ) -> Result<PublishResult, PublishError> {
        let creds = self.creds()?;
        let url = format!("{}/2/tweets", self.api_url);
        // JSON bodies are excluded from the OAuth signature
        let auth = oauth::authorization_header(creds, "POST", &url, &[]);

        let body = serde_json::json!({
            "text": text,
            "media": { "media_ids": [media_id] },
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", auth)
            .json(&body)
            .send()
            .await
            .map_err(|e| PublishError::Post(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Post creation rejected: {} - {}", status, body);
            return Err(PublishError::Post(platform_detail(status, &body)));
        }

        #[derive(Deserialize)]
        struct TweetResponse {
            data: TweetData,
        }

        #[derive(Deserialize)]
        struct TweetData {
            id: String,
        }

        let tweet: TweetResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Post(format!("unparseable response: {}", e)))?;

        debug!("Post created, id {}", tweet.data.id);
        Ok(PublishResult {
            platform_post_id: tweet.data.id,
            media_reference: media_id.to_string(),
        })
    }
}

/// Extract the platform's own error code/message from a failure body.
/// Handles both the v1.1 `errors` array and the v2 `title`/`detail` shape.
fn platform_detail(status: StatusCode, body: &str) -> String {
    #[derive(Deserialize)]
    struct V1ErrorBody {
        errors: Vec<V1Error>,
    }

    #[derive(Deserialize)]
    struct V1Error {
        code: i64,
        message: String,
    }

    #[derive(Deserialize)]
    struct V2ErrorBody {
        title: Option<String>,
        detail: Option<String>,
    }

    if let Ok(v1) = serde_json::from_str::<V1ErrorBody>(body) {
        if let Some(e) = v1.errors.first() {
            return format!("HTTP {} code {}: {}", status.as_u16(), e.code, e.message);
        }
    }

    if let Ok(v2) = serde_json::from_str::<V2ErrorBody>(body) {
        match (v2.title, v2.detail) {
            (Some(title), Some(detail)) => {
                return format!("HTTP {} {}: {}", status.as_u16(), title, detail)
            }
            (None, Some(detail)) => return format!("HTTP {}: {}", status.as_u16(), detail),
            (Some(title), None) => return format!("HTTP {}: {}", status.as_u16(), title),
            (None, None) => {}
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {}: {}", status.as_u16(), trimmed)
    }
}
