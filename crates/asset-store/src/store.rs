use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{AssetRef, Result, StoreId};

/// An object known to the store, as seen by an inventory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub store_id: StoreId,
    pub stored_at: DateTime<Utc>,
}

/// Core trait for remote asset store clients.
///
/// Each call either succeeds or fails once from the caller's point of view.
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Uploads the material at `path` and returns a reference to it.
    ///
    /// The store reads the material but never deletes it; releasing local
    /// material is the caller's responsibility.
    async fn store(&self, path: &Path) -> Result<AssetRef>;

    /// Deletes a previously stored object.
    ///
    /// Returns `NotFound` if no object exists under `store_id`.
    async fn delete(&self, store_id: &StoreId) -> Result<()>;
}

/// Listing capability used by the reconciliation sweep.
#[async_trait]
pub trait AssetInventory: Send + Sync {
    /// Returns every stored object whose upload happened before `cutoff`.
    async fn list_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<StoredObject>>;
}
