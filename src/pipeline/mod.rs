//! Publish pipeline orchestration
//!
//! Sequences generation -> staging -> publish -> cleanup and owns the
//! client-visible state, one state machine per session. Transitions are
//! checked and applied under a short-lived lock that is never held across
//! an await, so a slow external call stalls only its own session.

use std::collections::HashMap;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::media::{self, StagedMedia, StagingError, StagingStore};
use crate::openai::{GenerateError, OpenAiClient};
use crate::twitter::{PublishError, PublishResult, TwitterClient};

/// Client-visible pipeline state
///
/// Tagged variants make illegal combinations (generating and publishing at
/// once) unrepresentable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Generating,
    Staged { handle: String },
    Publishing,
    Published { result: PublishResult },
    Failed { reason: String },
}

impl PipelineState {
    /// Phase name, as serialized
    pub fn phase(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Generating => "generating",
            PipelineState::Staged { .. } => "staged",
            PipelineState::Publishing => "publishing",
            PipelineState::Published { .. } => "published",
            PipelineState::Failed { .. } => "failed",
        }
    }

    /// An operation is in flight; new calls must be rejected, not queued
    fn in_flight(&self) -> bool {
        matches!(self, PipelineState::Generating | PipelineState::Publishing)
    }

    fn staged_handle(&self) -> Option<&str> {
        match self {
            PipelineState::Staged { handle } => Some(handle),
            _ => None,
        }
    }
}

/// Pipeline operation errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("operation not valid while {0}")]
    InvalidState(&'static str),

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Staging(#[from] StagingError),
}

/// Where the publish step takes its media bytes from
#[derive(Debug)]
pub enum MediaSource {
    /// A staging store handle (canonical transport)
    Handle(String),
    /// Base64-encoded bytes supplied inline (compatibility shim)
    Inline(String),
}

struct Session {
    state: Mutex<PipelineState>,
}

/// Pipeline orchestrator: per-session state machines over shared clients
pub struct Pipeline {
    store: StagingStore,
    images: OpenAiClient,
    twitter: TwitterClient,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl Pipeline {
    pub fn new(store: StagingStore, images: OpenAiClient, twitter: TwitterClient) -> Self {
        Self {
            store,
            images,
            twitter,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn session(&self, session_id: &str) -> Arc<Session> {
        self.sessions
            .lock()
            .entry(session_id.to_string())
            .or_insert_with(|| {
                Arc::new(Session {
                    state: Mutex::new(PipelineState::Idle),
                })
            })
            .clone()
    }

    /// Current state for a session
    pub fn state(&self, session_id: &str) -> PipelineState {
        self.session(session_id).state.lock().clone()
    }

    /// Handles currently referenced by any session, for sweep exclusion
    pub fn active_handles(&self) -> Vec<String> {
        self.sessions
            .lock()
            .values()
            .filter_map(|s| s.state.lock().staged_handle().map(String::from))
            .collect()
    }

    /// Generate an image and stage it for this session
    ///
    /// Accepted from any settled state; a superseded staged entry is deleted
    /// once the replacement is staged.
    pub async fn generate(
        &self,
        session_id: &str,
        prompt: &str,
    ) -> Result<StagedMedia, PipelineError> {
        let session = self.session(session_id);

        let superseded = {
            let mut state = session.state.lock();
            if state.in_flight() {
                return Err(PipelineError::InvalidState(state.phase()));
            }
            let old = state.staged_handle().map(String::from);
            *state = PipelineState::Generating;
            old
        };

        match media::generate_staged_image(&self.images, &self.store, prompt).await {
            Ok(staged) => {
                *session.state.lock() = PipelineState::Staged {
                    handle: staged.handle.clone(),
                };
                if let Some(old) = superseded {
                    if let Err(e) = self.store.delete(&old).await {
                        warn!("Failed to delete superseded entry {}: {}", old, e);
                    }
                }
                Ok(staged)
            }
            Err(e) => {
                *session.state.lock() = PipelineState::Failed {
                    reason: e.to_string(),
                };
                Err(e.into())
            }
        }
    }

    /// Publish text plus media for this session
    ///
    /// By handle, this is valid from `Staged`, and from `Failed`/`Published`
    /// so a failed publish can be retried without regenerating; it is
    /// rejected from `Idle` and from any in-flight state. The inline
    /// transport skips staging entirely and is accepted from `Idle` too.
    /// On success via handle, the staged entry is deleted; on failure it is
    /// left intact.
    pub async fn publish(
        &self,
        session_id: &str,
        text: &str,
        source: MediaSource,
    ) -> Result<PublishResult, PipelineError> {
        let session = self.session(session_id);

        {
            let mut state = session.state.lock();
            if state.in_flight() {
                return Err(PipelineError::InvalidState(state.phase()));
            }
            if matches!(source, MediaSource::Handle(_))
                && matches!(*state, PipelineState::Idle)
            {
                return Err(PipelineError::InvalidState(state.phase()));
            }
            *state = PipelineState::Publishing;
        }

        let outcome = self.publish_inner(text, source).await;

        let mut state = session.state.lock();
        match outcome {
            Ok(result) => {
                *state = PipelineState::Published {
                    result: result.clone(),
                };
                Ok(result)
            }
            Err(e) => {
                *state = PipelineState::Failed {
                    reason: e.to_string(),
                };
                Err(e)
            }
        }
    }

    async fn publish_inner(
        &self,
        text: &str,
        source: MediaSource,
    ) -> Result<PublishResult, PipelineError> {
        // Resolve bytes first: a dangling handle must fail before any
        // platform call is made
        let (bytes, staged_handle) = match source {
            MediaSource::Handle(handle) => match self.store.get(&handle).await {
                Ok(bytes) => (bytes, Some(handle)),
                Err(StagingError::NotFound(h)) | Err(StagingError::InvalidHandle(h)) => {
                    return Err(PublishError::MediaNotFound(h).into());
                }
                Err(e) => return Err(e.into()),
            },
            MediaSource::Inline(encoded) => {
                let bytes = BASE64
                    .decode(encoded.trim())
                    .map_err(|e| PublishError::InvalidPayload(e.to_string()))?;
                (bytes, None)
            }
        };

        self.twitter.verify_credentials().await?;
        let media_id = self.twitter.upload_media(bytes).await?;
        let result = self.twitter.post_tweet(text, &media_id).await?;

        if let Some(handle) = staged_handle {
            if let Err(e) = self.store.delete(&handle).await {
                warn!(
                    "Failed to delete staged entry {} after publish: {}",
                    handle, e
                );
            }
        }

        Ok(result)
    }
}
