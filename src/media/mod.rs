//! Media staging and generation module
//!
//! Provides:
//! - Filesystem staging store bridging the generate and publish phases
//! - The generate-and-stage pipeline step

mod gen;
mod store;

pub use gen::generate_staged_image;
pub use store::{StagedMedia, StagingError, StagingStore};
