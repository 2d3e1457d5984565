//! TestServer - end-to-end test harness
//!
//! Boots the real Server in-process on an ephemeral port, with a temporary
//! staging directory and wiremock servers standing in for the image
//! generation service and the social platform API. Each instance is fully
//! isolated, so tests run in parallel.

// Each test binary uses a different subset of the harness
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tempfile::TempDir;
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use postd::{Config, Server};

/// PNG magic plus header fragment, stands in for generated image bytes
pub const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D',
    b'R',
];

/// In-process postd instance wired to mock upstreams
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    /// Stand-in for the image generation service
    pub image_api: MockServer,
    /// Stand-in for the platform REST and upload endpoints
    pub platform: MockServer,
    pub staging_dir: PathBuf,
    shutdown: watch::Sender<bool>,
    /// Staging directory parent (cleaned up on drop)
    _temp_dir: TempDir,
}

impl TestServer {
    /// Start a new test server instance
    pub async fn start() -> Result<Self> {
        let image_api = MockServer::start().await;
        let platform = MockServer::start().await;

        let temp_dir = TempDir::new()?;
        let staging_dir = temp_dir.path().join("staging");

        let mut config = Config::default();
        config.bind_addr = "127.0.0.1:0".parse()?;
        config.staging_dir = staging_dir.clone();
        config.request_timeout_secs = 5;
        // Sweep stays out of the way unless a test drives it directly
        config.sweep_interval_secs = 3600;
        config.sweep_min_age_secs = 3600;
        config.image.api_url = image_api.uri();
        config.image.api_key = Some("test-image-key".to_string());
        config.twitter.api_url = platform.uri();
        config.twitter.upload_url = platform.uri();
        config.twitter.api_key = Some("app-key".to_string());
        config.twitter.api_secret = Some("app-secret".to_string());
        config.twitter.access_token = Some("token".to_string());
        config.twitter.access_token_secret = Some("token-secret".to_string());

        let server = Server::new(config).await?;
        let addr = server.local_addr()?;
        let shutdown = server.shutdown_handle();
        tokio::spawn(server.run());

        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        Ok(Self {
            addr,
            client,
            image_api,
            platform,
            staging_dir,
            shutdown,
            _temp_dir: temp_dir,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?)
    }

    /// Make a POST request against a named pipeline session
    pub async fn post_session<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        session: &str,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .header("x-session", session)
            .json(body)
            .send()
            .await?)
    }

    /// Mount the happy-path image generation mocks: the generations call
    /// returns a transient URL pointing back at the mock, which serves the
    /// PNG bytes
    pub async fn mock_image_generation(&self) {
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "created": 1700000000,
                "data": [{ "url": format!("{}/files/generated.png", self.image_api.uri()) }]
            })))
            .mount(&self.image_api)
            .await;

        Mock::given(method("GET"))
            .and(path("/files/generated.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES))
            .mount(&self.image_api)
            .await;
    }

    /// Mount the happy-path platform mocks: credentials verify, media
    /// uploads, post creation succeeds
    pub async fn mock_platform_publish(&self) {
        self.mock_platform_verify().await;
        self.mock_platform_upload().await;

        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "data": { "id": "1050118621198921728", "text": "check this out" }
            })))
            .mount(&self.platform)
            .await;
    }

    pub async fn mock_platform_verify(&self) {
        Mock::given(method("GET"))
            .and(path("/1.1/account/verify_credentials.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id_str": "2244994945",
                "screen_name": "tester"
            })))
            .mount(&self.platform)
            .await;
    }

    pub async fn mock_platform_upload(&self) {
        Mock::given(method("POST"))
            .and(path("/1.1/media/upload.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "media_id": 710511363345354753_i64,
                "media_id_string": "710511363345354753"
            })))
            .mount(&self.platform)
            .await;
    }

    /// Requests the platform mock has seen for a given path
    pub async fn platform_requests_to(&self, to: &str) -> usize {
        self.platform
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == to)
            .count()
    }

    /// Requests the image service mock has seen
    pub async fn image_api_request_count(&self) -> usize {
        self.image_api
            .received_requests()
            .await
            .unwrap_or_default()
            .len()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}
