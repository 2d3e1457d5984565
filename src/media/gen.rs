//! Prompt-to-staged-image pipeline step
//!
//! Two-step process:
//! 1. The image service turns the prompt into a short-lived image URL,
//!    which is dereferenced immediately for the bytes
//! 2. The bytes are staged under a fresh handle for later publishing

use tracing::info;

use crate::media::{StagedMedia, StagingStore};
use crate::openai::{GenerateError, OpenAiClient};

/// Generate an image for `prompt` and stage it
///
/// Single attempt; an empty prompt fails before any network call.
pub async fn generate_staged_image(
    client: &OpenAiClient,
    store: &StagingStore,
    prompt: &str,
) -> Result<StagedMedia, GenerateError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(GenerateError::InvalidInput);
    }

    info!("Generating image for prompt ({} chars)", prompt.len());

    let bytes = client.generate(prompt).await?;
    let staged = store.put(&bytes).await?;

    info!(
        "Image generated and staged as {} ({} bytes)",
        staged.handle, staged.len
    );
    Ok(staged)
}
