use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{RecordId, StoreId};
use tokio::sync::RwLock;

use crate::{IngestionRecord, NewIngestionRecord, RecordStore, RecordStoreError, Result};

#[derive(Debug, Default)]
struct InMemoryRecordState {
    records: HashMap<RecordId, IngestionRecord>,
    create_calls: usize,
    fail_on_create: Option<RecordStoreError>,
}

/// In-memory record store implementation for testing.
///
/// Enforces the same constraints as the PostgreSQL schema: non-blank title
/// and description, and each store ID referenced by at most one record.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    state: Arc<RwLock<InMemoryRecordState>>,
}

impl InMemoryRecordStore {
    /// Creates a new empty in-memory record store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `create` fail with `error`, or clears the failure with `None`.
    pub async fn set_fail_on_create(&self, error: Option<RecordStoreError>) {
        self.state.write().await.fail_on_create = error;
    }

    /// Returns the number of stored records.
    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// Returns how many times `create` was called.
    pub async fn create_calls(&self) -> usize {
        self.state.read().await.create_calls
    }

    /// Returns every stored record.
    pub async fn records(&self) -> Vec<IngestionRecord> {
        self.state.read().await.records.values().cloned().collect()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create(&self, fields: NewIngestionRecord) -> Result<IngestionRecord> {
        let mut state = self.state.write().await;
        state.create_calls += 1;

        if let Some(error) = state.fail_on_create.clone() {
            return Err(error);
        }

        if fields.title.trim().is_empty() {
            return Err(RecordStoreError::ValidationRejected(
                "media_records_title_not_blank".to_string(),
            ));
        }
        if fields.description.trim().is_empty() {
            return Err(RecordStoreError::ValidationRejected(
                "media_records_description_not_blank".to_string(),
            ));
        }

        for existing in state.records.values() {
            if existing.references(&fields.primary.store_id) {
                return Err(RecordStoreError::DuplicateKey(
                    "unique_video_store_id".to_string(),
                ));
            }
            if existing.references(&fields.secondary.store_id) {
                return Err(RecordStoreError::DuplicateKey(
                    "unique_thumbnail_store_id".to_string(),
                ));
            }
        }

        let record = IngestionRecord::from_new(RecordId::new(), fields, Utc::now());
        state.records.insert(record.id, record.clone());

        Ok(record)
    }

    async fn get(&self, id: RecordId) -> Result<Option<IngestionRecord>> {
        Ok(self.state.read().await.records.get(&id).cloned())
    }

    async fn is_referenced(&self, store_id: &StoreId) -> Result<bool> {
        Ok(self
            .state
            .read()
            .await
            .records
            .values()
            .any(|record| record.references(store_id)))
    }
}

#[cfg(test)]
mod tests {
    use common::{AssetRef, OwnerId};

    use super::*;

    fn asset(id: &str) -> AssetRef {
        AssetRef {
            url: format!("memory://assets/{id}"),
            store_id: StoreId::new(id),
            bytes: 10,
            duration_secs: None,
        }
    }

    fn fields(primary: &str, secondary: &str) -> NewIngestionRecord {
        NewIngestionRecord {
            owner: OwnerId::new(),
            title: "x".to_string(),
            description: "y".to_string(),
            primary: asset(primary),
            secondary: asset(secondary),
            duration_secs: 0.0,
            is_published: true,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryRecordStore::new();
        let record = store.create(fields("a", "b")).await.unwrap();

        let loaded = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.primary.store_id, StoreId::new("a"));
        assert_eq!(store.record_count().await, 1);
    }

    #[tokio::test]
    async fn test_blank_title_is_rejected() {
        let store = InMemoryRecordStore::new();
        let mut new = fields("a", "b");
        new.title = "   ".to_string();

        let result = store.create(new).await;
        assert!(matches!(result, Err(RecordStoreError::ValidationRejected(_))));
        assert_eq!(store.record_count().await, 0);
    }

    #[tokio::test]
    async fn test_store_id_can_only_be_referenced_once() {
        let store = InMemoryRecordStore::new();
        store.create(fields("a", "b")).await.unwrap();

        let result = store.create(fields("c", "a")).await;
        assert!(matches!(result, Err(RecordStoreError::DuplicateKey(_))));
    }

    #[tokio::test]
    async fn test_is_referenced() {
        let store = InMemoryRecordStore::new();
        store.create(fields("a", "b")).await.unwrap();

        assert!(store.is_referenced(&StoreId::new("a")).await.unwrap());
        assert!(store.is_referenced(&StoreId::new("b")).await.unwrap());
        assert!(!store.is_referenced(&StoreId::new("c")).await.unwrap());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = InMemoryRecordStore::new();
        store
            .set_fail_on_create(Some(RecordStoreError::Unavailable("db down".into())))
            .await;

        let result = store.create(fields("a", "b")).await;
        assert_eq!(result, Err(RecordStoreError::Unavailable("db down".into())));
        assert_eq!(store.create_calls().await, 1);
        assert_eq!(store.record_count().await, 0);
    }
}
