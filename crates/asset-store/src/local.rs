//! Filesystem-backed asset store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use uuid::Uuid;

use crate::store::{AssetInventory, AssetStore, StoredObject};
use crate::{AssetRef, AssetStoreError, Result, StoreId};

/// Name prefix of objects still being written.
///
/// A write abandoned mid-copy can leave such a file behind; no record ever
/// references it, so reconciliation collects it like any other orphan.
pub const PARTIAL_PREFIX: &str = ".partial-";

/// An object being written under a temporary name.
///
/// Dropping it before [`PartialObject::publish`] removes the temporary file,
/// so a cancelled `store` never leaves an object under its final ID.
struct PartialObject {
    path: PathBuf,
    published: bool,
}

impl PartialObject {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            published: false,
        }
    }

    /// Moves the object to its final name. Synchronous, so it cannot be
    /// interrupted by the caller dropping the future.
    fn publish(mut self, target: &Path) -> std::io::Result<()> {
        std::fs::rename(&self.path, target)?;
        self.published = true;
        Ok(())
    }
}

impl Drop for PartialObject {
    fn drop(&mut self) {
        if self.published {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove partial object");
            }
            _ => {}
        }
    }
}

/// Content store that keeps objects as flat files under a root directory.
///
/// Each stored object gets a fresh UUID-based store ID (keeping the source
/// extension) and is served from `<base_url>/<store_id>`. Bytes are copied
/// to a [`PARTIAL_PREFIX`] name first and renamed into place once complete,
/// so an object appears under its store ID only if `store` returns it.
#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    root: PathBuf,
    base_url: String,
}

impl LocalAssetStore {
    /// Creates the store, creating `root` if it does not exist yet.
    pub async fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Result<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            AssetStoreError::Unreachable(format!(
                "Failed to create asset directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self {
            root,
            base_url: base_url.into(),
        })
    }

    /// Returns the root directory objects are written to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store IDs are flat file names; anything that could escape the root is rejected.
    fn object_path(&self, store_id: &StoreId) -> Result<PathBuf> {
        let id = store_id.as_str();
        if id.is_empty() || id.contains("..") || id.contains('/') || id.contains('\\') {
            return Err(AssetStoreError::Rejected(format!(
                "invalid store id: {store_id}"
            )));
        }
        Ok(self.root.join(id))
    }

    fn generate_id(source: &Path) -> StoreId {
        let uuid = Uuid::new_v4().simple();
        match source.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if !ext.is_empty() => StoreId::new(format!("{uuid}.{}", ext.to_lowercase())),
            _ => StoreId::new(uuid.to_string()),
        }
    }

    fn generate_url(&self, store_id: &StoreId) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), store_id)
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    #[tracing::instrument(skip(self), fields(root = %self.root.display()))]
    async fn store(&self, path: &Path) -> Result<AssetRef> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| AssetStoreError::Rejected(format!("unreadable source: {e}")))?;

        if !metadata.is_file() {
            return Err(AssetStoreError::Rejected("source is not a file".to_string()));
        }
        if metadata.len() == 0 {
            return Err(AssetStoreError::Rejected("empty file".to_string()));
        }

        let store_id = Self::generate_id(path);
        let target = self.object_path(&store_id)?;
        let start = std::time::Instant::now();

        let partial = PartialObject::new(self.root.join(format!("{PARTIAL_PREFIX}{store_id}")));
        let bytes = fs::copy(path, &partial.path).await.map_err(|e| {
            AssetStoreError::Unreachable(format!(
                "Failed to write object {}: {}",
                target.display(),
                e
            ))
        })?;
        // No await between the rename and the return.
        partial.publish(&target).map_err(|e| {
            AssetStoreError::Unreachable(format!(
                "Failed to publish object {}: {}",
                target.display(),
                e
            ))
        })?;

        let url = self.generate_url(&store_id);

        tracing::info!(
            %store_id,
            size_bytes = bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "asset stored"
        );

        Ok(AssetRef {
            url,
            store_id,
            bytes,
            duration_secs: None,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, store_id: &StoreId) -> Result<()> {
        let target = self.object_path(store_id)?;

        match fs::remove_file(&target).await {
            Ok(()) => {
                tracing::info!(%store_id, "asset deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AssetStoreError::NotFound(store_id.clone()))
            }
            Err(e) => Err(AssetStoreError::Unreachable(format!(
                "Failed to delete object {}: {}",
                target.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl AssetInventory for LocalAssetStore {
    async fn list_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<StoredObject>> {
        let unreachable = |e: std::io::Error| AssetStoreError::Unreachable(e.to_string());

        let mut entries = fs::read_dir(&self.root).await.map_err(unreachable)?;
        let mut objects = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(unreachable)? {
            let metadata = entry.metadata().await.map_err(unreachable)?;
            if !metadata.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let stored_at: DateTime<Utc> = metadata.modified().map_err(unreachable)?.into();
            if stored_at < cutoff {
                objects.push(StoredObject {
                    store_id: StoreId::new(name),
                    stored_at,
                });
            }
        }

        objects.sort_by(|a, b| a.stored_at.cmp(&b.stored_at));
        Ok(objects)
    }
}
