//! Filesystem-backed media staging store
//!
//! Staged images live as `{handle}.png` files under a single staging
//! directory. Handles combine a millisecond timestamp with a UUID, so
//! concurrent generations never collide and a deleted handle is never
//! reused. A `.keep` sentinel marks the directory as initialized and
//! survives sweeps.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Sentinel entry that marks the staging root and is never swept.
const SENTINEL: &str = ".keep";

/// Maximum accepted handle length.
const MAX_HANDLE_LEN: usize = 64;

/// A staged image, addressable by handle until deleted.
#[derive(Debug, Clone)]
pub struct StagedMedia {
    pub handle: String,
    pub path: PathBuf,
    pub len: u64,
    pub created_at: DateTime<Utc>,
}

/// Staging store errors
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("staged media not found: {0}")]
    NotFound(String),

    #[error("invalid media handle: {0:?}")]
    InvalidHandle(String),

    #[error("staging write failed: {0}")]
    WriteFailed(#[source] std::io::Error),

    #[error("staging read failed: {0}")]
    ReadFailed(#[source] std::io::Error),
}

/// Filesystem staging store rooted at a well-known directory
#[derive(Debug, Clone)]
pub struct StagingStore {
    root: PathBuf,
}

impl StagingStore {
    /// Create a store rooted at `root`. Call [`StagingStore::init`] before use.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Staging root directory
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Create the staging root and sentinel. Idempotent.
    pub async fn init(&self) -> Result<(), StagingError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(StagingError::WriteFailed)?;

        let sentinel = self.root.join(SENTINEL);
        if tokio::fs::try_exists(&sentinel)
            .await
            .map_err(StagingError::ReadFailed)?
        {
            return Ok(());
        }
        tokio::fs::write(&sentinel, b"")
            .await
            .map_err(StagingError::WriteFailed)
    }

    /// Check the staging root is present and readable
    pub async fn health_check(&self) -> Result<(), StagingError> {
        tokio::fs::read_dir(&self.root)
            .await
            .map(|_| ())
            .map_err(StagingError::ReadFailed)
    }

    /// Mint a collision-resistant handle: millisecond timestamp plus UUID
    fn mint_handle() -> String {
        format!(
            "{}-{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple()
        )
    }

    /// Handles are alphanumeric/hyphen only, so they can never escape the root
    fn validate_handle(handle: &str) -> Result<(), StagingError> {
        let ok = !handle.is_empty()
            && handle.len() <= MAX_HANDLE_LEN
            && handle
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        if ok {
            Ok(())
        } else {
            Err(StagingError::InvalidHandle(handle.to_string()))
        }
    }

    fn path_for(&self, handle: &str) -> PathBuf {
        self.root.join(format!("{}.png", handle))
    }

    /// Write bytes under a freshly minted handle
    pub async fn put(&self, bytes: &[u8]) -> Result<StagedMedia, StagingError> {
        self.init().await?;

        let handle = Self::mint_handle();
        let path = self.path_for(&handle);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(StagingError::WriteFailed)?;

        debug!("Staged {} ({} bytes)", handle, bytes.len());
        Ok(StagedMedia {
            handle,
            path,
            len: bytes.len() as u64,
            created_at: Utc::now(),
        })
    }

    /// Read staged bytes by handle
    pub async fn get(&self, handle: &str) -> Result<Vec<u8>, StagingError> {
        Self::validate_handle(handle)?;

        match tokio::fs::read(self.path_for(handle)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StagingError::NotFound(handle.to_string()))
            }
            Err(e) => Err(StagingError::ReadFailed(e)),
        }
    }

    /// Check whether a handle resolves to a staged entry
    pub async fn exists(&self, handle: &str) -> bool {
        Self::validate_handle(handle).is_ok()
            && tokio::fs::try_exists(self.path_for(handle))
                .await
                .unwrap_or(false)
    }

    /// Delete a staged entry. Deleting a missing handle is a success, so
    /// cleanup sweeps can race normal consumption.
    pub async fn delete(&self, handle: &str) -> Result<(), StagingError> {
        Self::validate_handle(handle)?;

        match tokio::fs::remove_file(self.path_for(handle)).await {
            Ok(()) => {
                debug!("Deleted staged entry {}", handle);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StagingError::WriteFailed(e)),
        }
    }

    /// Delete staged entries, sparing the sentinel, everything in `exclude`,
    /// and entries younger than `min_age` (so a sweep cannot remove a handle
    /// between a `get` and the requester finishing with the bytes).
    ///
    /// Returns the number of entries removed.
    pub async fn sweep(
        &self,
        exclude: &[String],
        min_age: Duration,
    ) -> Result<usize, StagingError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StagingError::ReadFailed(e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(StagingError::ReadFailed)?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name == SENTINEL {
                continue;
            }

            let handle = name.strip_suffix(".png").unwrap_or(name);
            if exclude.iter().any(|h| h == handle) {
                continue;
            }

            let age = entry
                .metadata()
                .await
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|t| t.elapsed().ok());
            match age {
                Some(age) if age >= min_age => {}
                // Unreadable mtime counts as young
                _ => continue,
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to sweep {}: {}", name, e),
            }
        }

        if removed > 0 {
            debug!("Sweep removed {} staged entries", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, StagingStore) {
        let dir = TempDir::new().unwrap();
        let store = StagingStore::new(dir.path().join("staging"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let (_dir, store) = store();
        let staged = store.put(b"png bytes").await.unwrap();

        assert!(staged.len > 0);
        let bytes = store.get(&staged.handle).await.unwrap();
        assert_eq!(bytes, b"png bytes");
    }

    #[tokio::test]
    async fn test_identical_bytes_get_distinct_handles() {
        let (_dir, store) = store();
        let a = store.put(b"same").await.unwrap();
        let b = store.put(b"same").await.unwrap();
        assert_ne!(a.handle, b.handle);
    }

    #[tokio::test]
    async fn test_concurrent_puts_never_collide() {
        let (_dir, store) = store();
        let (a, b, c, d) = tokio::join!(
            store.put(b"a"),
            store.put(b"b"),
            store.put(b"c"),
            store.put(b"d")
        );
        let handles = [
            a.unwrap().handle,
            b.unwrap().handle,
            c.unwrap().handle,
            d.unwrap().handle,
        ];
        for i in 0..handles.len() {
            for j in (i + 1)..handles.len() {
                assert_ne!(handles[i], handles[j]);
            }
        }
    }

    #[tokio::test]
    async fn test_get_unknown_handle_is_not_found() {
        let (_dir, store) = store();
        store.init().await.unwrap();

        match store.get("1700000000000-deadbeef").await {
            Err(StagingError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other.map(|b| b.len())),
        }
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, store) = store();
        let staged = store.put(b"bytes").await.unwrap();

        store.delete(&staged.handle).await.unwrap();
        // Second delete of the same handle is not an error
        store.delete(&staged.handle).await.unwrap();

        match store.get(&staged.handle).await {
            Err(StagingError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other.map(|b| b.len())),
        }
    }

    #[tokio::test]
    async fn test_handle_cannot_escape_root() {
        let (_dir, store) = store();
        store.init().await.unwrap();

        for bad in ["../escape", "a/b", "", "x".repeat(65).as_str()] {
            assert!(matches!(
                store.get(bad).await,
                Err(StagingError::InvalidHandle(_))
            ));
            assert!(matches!(
                store.delete(bad).await,
                Err(StagingError::InvalidHandle(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_sweep_spares_sentinel_and_excluded() {
        let (_dir, store) = store();
        let keep = store.put(b"keep").await.unwrap();
        let drop = store.put(b"drop").await.unwrap();

        let removed = store
            .sweep(&[keep.handle.clone()], Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(store.exists(&keep.handle).await);
        assert!(!store.exists(&drop.handle).await);
        // Sentinel survives, so init stays idempotent
        assert!(store.root().join(SENTINEL).exists());
    }

    #[tokio::test]
    async fn test_sweep_spares_young_entries() {
        let (_dir, store) = store();
        let fresh = store.put(b"fresh").await.unwrap();

        let removed = store.sweep(&[], Duration::from_secs(3600)).await.unwrap();

        assert_eq!(removed, 0);
        assert!(store.exists(&fresh.handle).await);
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let (_dir, store) = store();
        store.init().await.unwrap();
        store.init().await.unwrap();
        store.health_check().await.unwrap();
    }
}
