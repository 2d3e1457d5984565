//! Daemon configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then
//! `POSTD_`-prefixed environment variables (double underscore for nesting,
//! e.g. `POSTD_IMAGE__API_KEY`). The secret variables the original
//! deployment used (`OPENAI_API_KEY`, `TWITTER_*`) are honored as a final
//! fallback.
//!
//! Missing secrets are a configuration error, detected at startup before
//! any external call, distinct from a runtime auth failure.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required secrets: {0}")]
    MissingSecrets(String),

    #[error(transparent)]
    Figment(#[from] Box<figment::Error>),
}

/// Image generation service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// API base URL (OpenAI-compatible)
    pub api_url: String,
    /// API key (`OPENAI_API_KEY`)
    pub api_key: Option<String>,
    /// Generation model
    pub model: String,
    /// Fixed output resolution
    pub size: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "dall-e-3".to_string(),
            size: "1024x1024".to_string(),
        }
    }
}

/// Social platform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    /// REST API base URL
    pub api_url: String,
    /// Media upload base URL
    pub upload_url: String,
    /// App key (`TWITTER_API_KEY`)
    pub api_key: Option<String>,
    /// App secret (`TWITTER_API_SECRET`)
    pub api_secret: Option<String>,
    /// Access token (`TWITTER_ACCESS_TOKEN`)
    pub access_token: Option<String>,
    /// Access token secret (`TWITTER_ACCESS_TOKEN_SECRET`)
    pub access_token_secret: Option<String>,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.twitter.com".to_string(),
            upload_url: "https://upload.twitter.com".to_string(),
            api_key: None,
            api_secret: None,
            access_token: None,
            access_token_secret: None,
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Staging directory for generated images
    pub staging_dir: PathBuf,
    /// Bounded wait for every external call
    pub request_timeout_secs: u64,
    /// How often the background sweep runs
    pub sweep_interval_secs: u64,
    /// Entries younger than this are never swept
    pub sweep_min_age_secs: u64,
    pub image: ImageConfig,
    pub twitter: TwitterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".parse().unwrap(),
            staging_dir: PathBuf::from("staging"),
            request_timeout_secs: 60,
            sweep_interval_secs: 300,
            sweep_min_age_secs: 3600,
            image: ImageConfig::default(),
            twitter: TwitterConfig::default(),
        }
    }
}

impl Config {
    /// Load config: defaults, then TOML file, then environment
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.unwrap_or_else(|| Path::new("postd.toml"))))
            .merge(Env::prefixed("POSTD_").split("__"));

        let mut config: Config = figment.extract().map_err(Box::new)?;
        config.apply_legacy_env();
        Ok(config)
    }

    /// Secret fallbacks under the names the original deployment used
    fn apply_legacy_env(&mut self) {
        let fill = |slot: &mut Option<String>, var: &str| {
            if slot.is_none() {
                *slot = std::env::var(var).ok().filter(|v| !v.is_empty());
            }
        };
        fill(&mut self.image.api_key, "OPENAI_API_KEY");
        fill(&mut self.twitter.api_key, "TWITTER_API_KEY");
        fill(&mut self.twitter.api_secret, "TWITTER_API_SECRET");
        fill(&mut self.twitter.access_token, "TWITTER_ACCESS_TOKEN");
        fill(
            &mut self.twitter.access_token_secret,
            "TWITTER_ACCESS_TOKEN_SECRET",
        );
    }

    /// Check every required secret is present, reporting all that are not
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (self.image.api_key.is_some(), "image.api_key (OPENAI_API_KEY)"),
            (
                self.twitter.api_key.is_some(),
                "twitter.api_key (TWITTER_API_KEY)",
            ),
            (
                self.twitter.api_secret.is_some(),
                "twitter.api_secret (TWITTER_API_SECRET)",
            ),
            (
                self.twitter.access_token.is_some(),
                "twitter.access_token (TWITTER_ACCESS_TOKEN)",
            ),
            (
                self.twitter.access_token_secret.is_some(),
                "twitter.access_token_secret (TWITTER_ACCESS_TOKEN_SECRET)",
            ),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(present, _)| !present)
            .map(|(_, name)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingSecrets(missing.join(", ")))
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn sweep_min_age(&self) -> Duration {
        Duration::from_secs(self.sweep_min_age_secs)
    }
}
