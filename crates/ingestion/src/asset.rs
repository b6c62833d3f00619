//! Local source material and single-shot upload attempts.

use std::path::{Path, PathBuf};

use asset_store::{AssetRef, AssetStore, AssetStoreError};

use crate::error::PreconditionError;

/// Owned handle to a local temporary file awaiting upload.
///
/// The handle is move-only: it is consumed by [`LocalAsset::release`], which
/// deletes the file. A handle dropped without being released deletes the
/// file synchronously, so local material never outlives its handle.
#[derive(Debug)]
pub struct LocalAsset {
    path: PathBuf,
    armed: bool,
}

impl LocalAsset {
    /// Takes ownership of the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    /// Returns the path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Verifies that the material exists and is non-empty; returns its size.
    pub async fn check(&self) -> Result<u64, PreconditionError> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|_| PreconditionError::Unreadable(self.path.clone()))?;

        if !metadata.is_file() {
            return Err(PreconditionError::Unreadable(self.path.clone()));
        }
        if metadata.len() == 0 {
            return Err(PreconditionError::EmptyMaterial(self.path.clone()));
        }
        Ok(metadata.len())
    }

    /// Deletes the local file, consuming the handle.
    pub async fn release(mut self) {
        self.armed = false;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::debug!(path = %self.path.display(), "local material released"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to release local material")
            }
        }
    }
}

/// Fallback for handles that were never released. The normal path is the
/// async [`LocalAsset::release`]; this removal blocks the current thread.
impl Drop for LocalAsset {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release dropped local material");
        }
    }
}

/// Which of the two assets an upload attempt concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetRole {
    /// The primary media file.
    Primary,
    /// The thumbnail/preview image.
    Secondary,
}

impl AssetRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetRole::Primary => "primary",
            AssetRole::Secondary => "secondary",
        }
    }
}

impl std::fmt::Display for AssetRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of an upload attempt. Leaves `Pending` exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadStatus {
    Pending,
    Stored(AssetRef),
    Failed(AssetStoreError),
}

/// One upload of one local asset to the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetUploadAttempt {
    role: AssetRole,
    source: PathBuf,
    status: UploadStatus,
}

impl AssetUploadAttempt {
    fn pending(role: AssetRole, asset: &LocalAsset) -> Self {
        Self {
            role,
            source: asset.path().to_path_buf(),
            status: UploadStatus::Pending,
        }
    }

    fn resolve(&mut self, result: Result<AssetRef, AssetStoreError>) {
        debug_assert!(
            matches!(self.status, UploadStatus::Pending),
            "upload attempt resolved twice"
        );
        self.status = match result {
            Ok(asset) => UploadStatus::Stored(asset),
            Err(e) => UploadStatus::Failed(e),
        };
    }

    /// Uploads `asset` and releases its local material once the call resolves.
    ///
    /// The store call is always awaited to completion; the local file is
    /// deleted whether the upload succeeded or failed.
    pub async fn run<A: AssetStore>(store: &A, role: AssetRole, asset: LocalAsset) -> Self {
        let mut attempt = Self::pending(role, &asset);
        tracing::info!(role = role.as_str(), "uploading asset");

        let result = store.store(asset.path()).await;
        asset.release().await;

        attempt.resolve(result);
        attempt
    }

    pub fn role(&self) -> AssetRole {
        self.role
    }

    /// Path the material was read from. It no longer exists once resolved.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn status(&self) -> &UploadStatus {
        &self.status
    }

    /// Returns the remote reference if the upload succeeded.
    pub fn remote_ref(&self) -> Option<&AssetRef> {
        match &self.status {
            UploadStatus::Stored(asset) => Some(asset),
            _ => None,
        }
    }

    /// Converts a resolved attempt into the store's result.
    pub fn into_result(self) -> Result<AssetRef, AssetStoreError> {
        match self.status {
            UploadStatus::Stored(asset) => Ok(asset),
            UploadStatus::Failed(e) => Err(e),
            UploadStatus::Pending => Err(AssetStoreError::Unreachable(
                "upload attempt never resolved".to_string(),
            )),
        }
    }
}
