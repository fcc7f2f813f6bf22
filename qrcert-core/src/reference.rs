//! Reference digest storage.
//!
//! The reference digest is the only state shared between verifications. It is
//! written by enrollment and read by every verification, so both stores put it
//! behind a reader/writer lock: concurrent verifications never block each
//! other, and enrollment waits for in-flight reads to finish.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::digest::ImageDigest;
use crate::error::{Result, VerifyError};

/// Default side file holding the enrolled digest.
pub const DEFAULT_REFERENCE_FILE: &str = "original_qr_hash.txt";

/// Storage backend for the enrolled reference digest.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Load the enrolled digest, `None` when nothing has been enrolled yet.
    async fn load(&self) -> Result<Option<ImageDigest>>;

    /// Replace the enrolled digest.
    async fn store(&self, digest: ImageDigest) -> Result<()>;
}

/// Hash a trusted original image and record it as the reference.
///
/// Callers are responsible for only passing images from a trusted source;
/// the HTTP layer guards this with the enrollment token.
#[instrument(level = "debug", skip_all, fields(bytes = image.len()))]
pub async fn enroll(store: &dyn ReferenceStore, image: &[u8]) -> Result<ImageDigest> {
    let digest = ImageDigest::of(image);
    store.store(digest).await?;
    info!(digest = %digest, "Reference digest enrolled");
    Ok(digest)
}

/// Reference digest kept as a single hex line in a side file.
pub struct FileReferenceStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileReferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl ReferenceStore for FileReferenceStore {
    async fn load(&self) -> Result<Option<ImageDigest>> {
        let _guard = self.lock.read().await;

        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let digest = ImageDigest::from_hex(&contents)?;
                debug!(path = %self.path.display(), "Loaded reference digest");
                Ok(Some(digest))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VerifyError::Store(format!(
                "Failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn store(&self, digest: ImageDigest) -> Result<()> {
        let _guard = self.lock.write().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                VerifyError::Store(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        // Write-then-rename so a concurrent reader in another process never
        // sees a truncated digest.
        let temp = self.temp_path();
        tokio::fs::write(&temp, digest.to_hex())
            .await
            .map_err(|e| VerifyError::Store(format!("Failed to write {}: {e}", temp.display())))?;
        tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
            VerifyError::Store(format!(
                "Failed to move digest into {}: {e}",
                self.path.display()
            ))
        })?;

        debug!(path = %self.path.display(), "Stored reference digest");
        Ok(())
    }
}

/// In-process reference store for tests and development.
#[derive(Default)]
pub struct MemoryReferenceStore {
    digest: RwLock<Option<ImageDigest>>,
}

impl MemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a digest already enrolled.
    pub fn with_digest(digest: ImageDigest) -> Self {
        Self {
            digest: RwLock::new(Some(digest)),
        }
    }
}

#[async_trait]
impl ReferenceStore for MemoryReferenceStore {
    async fn load(&self) -> Result<Option<ImageDigest>> {
        Ok(*self.digest.read().await)
    }

    async fn store(&self, digest: ImageDigest) -> Result<()> {
        *self.digest.write().await = Some(digest);
        Ok(())
    }
}
