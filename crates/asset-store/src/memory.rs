//! In-memory asset store for testing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::store::{AssetInventory, AssetStore, StoredObject};
use crate::{AssetRef, AssetStoreError, Result, StoreId};

#[derive(Debug, Default)]
struct InMemoryAssetState {
    objects: HashMap<StoreId, (AssetRef, DateTime<Utc>)>,
    next_id: u32,
    store_calls: Vec<PathBuf>,
    delete_calls: Vec<StoreId>,
    /// Failures keyed by the 1-based index of the `store` call they apply to.
    store_failures: HashMap<usize, AssetStoreError>,
    delete_failures: HashMap<StoreId, AssetStoreError>,
    fail_all_deletes: Option<AssetStoreError>,
}

/// In-memory asset store with failure injection and call recording.
///
/// Objects get sequential IDs (`asset-0001`, `asset-0002`, ...). The source
/// file must exist and be non-empty, like a real upload.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssetStore {
    state: Arc<RwLock<InMemoryAssetState>>,
}

impl InMemoryAssetStore {
    /// Creates a new empty in-memory asset store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the `call`-th invocation of `store` (1-based) fail with `error`.
    pub async fn fail_store_on_call(&self, call: usize, error: AssetStoreError) {
        self.state.write().await.store_failures.insert(call, error);
    }

    /// Makes every `delete` of `store_id` fail with `error`.
    pub async fn fail_delete_of(&self, store_id: &StoreId, error: AssetStoreError) {
        self.state
            .write()
            .await
            .delete_failures
            .insert(store_id.clone(), error);
    }

    /// Makes every `delete` fail with `error`, or clears the failure with `None`.
    pub async fn set_fail_on_delete(&self, error: Option<AssetStoreError>) {
        self.state.write().await.fail_all_deletes = error;
    }

    /// Inserts an object directly, bypassing `store`.
    pub async fn insert_object(&self, store_id: StoreId, stored_at: DateTime<Utc>) {
        let asset = AssetRef {
            url: format!("memory://assets/{store_id}"),
            store_id: store_id.clone(),
            bytes: 0,
            duration_secs: None,
        };
        self.state
            .write()
            .await
            .objects
            .insert(store_id, (asset, stored_at));
    }

    /// Returns the number of objects currently held.
    pub async fn object_count(&self) -> usize {
        self.state.read().await.objects.len()
    }

    /// Returns true if an object exists under `store_id`.
    pub async fn has_object(&self, store_id: &StoreId) -> bool {
        self.state.read().await.objects.contains_key(store_id)
    }

    /// Returns the source paths passed to `store`, in call order.
    pub async fn store_calls(&self) -> Vec<PathBuf> {
        self.state.read().await.store_calls.clone()
    }

    /// Returns the IDs passed to `delete`, in call order.
    pub async fn delete_calls(&self) -> Vec<StoreId> {
        self.state.read().await.delete_calls.clone()
    }
}

#[async_trait]
impl AssetStore for InMemoryAssetStore {
    async fn store(&self, path: &Path) -> Result<AssetRef> {
        let metadata = tokio::fs::metadata(path).await;

        let mut state = self.state.write().await;
        state.store_calls.push(path.to_path_buf());

        let call = state.store_calls.len();
        if let Some(error) = state.store_failures.remove(&call) {
            return Err(error);
        }

        let bytes = metadata
            .map(|m| m.len())
            .map_err(|e| AssetStoreError::Rejected(format!("unreadable source: {e}")))?;

        if bytes == 0 {
            return Err(AssetStoreError::Rejected("empty file".to_string()));
        }

        state.next_id += 1;
        let store_id = StoreId::new(format!("asset-{:04}", state.next_id));
        let asset = AssetRef {
            url: format!("memory://assets/{store_id}"),
            store_id: store_id.clone(),
            bytes,
            duration_secs: None,
        };
        state
            .objects
            .insert(store_id, (asset.clone(), Utc::now()));

        Ok(asset)
    }

    async fn delete(&self, store_id: &StoreId) -> Result<()> {
        let mut state = self.state.write().await;
        state.delete_calls.push(store_id.clone());

        if let Some(error) = state.fail_all_deletes.clone() {
            return Err(error);
        }
        if let Some(error) = state.delete_failures.get(store_id) {
            return Err(error.clone());
        }

        match state.objects.remove(store_id) {
            Some(_) => Ok(()),
            None => Err(AssetStoreError::NotFound(store_id.clone())),
        }
    }
}

#[async_trait]
impl AssetInventory for InMemoryAssetStore {
    async fn list_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<StoredObject>> {
        let state = self.state.read().await;
        let mut objects: Vec<_> = state
            .objects
            .iter()
            .filter(|(_, (_, stored_at))| *stored_at < cutoff)
            .map(|(store_id, (_, stored_at))| StoredObject {
                store_id: store_id.clone(),
                stored_at: *stored_at,
            })
            .collect();
        objects.sort_by(|a, b| a.stored_at.cmp(&b.stored_at));
        Ok(objects)
    }
}
