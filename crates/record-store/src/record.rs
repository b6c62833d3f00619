use chrono::{DateTime, Utc};
use common::{AssetRef, OwnerId, RecordId};
use serde::{Deserialize, Serialize};

/// Fields the ingestion saga hands to the record store on commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIngestionRecord {
    pub owner: OwnerId,
    pub title: String,
    pub description: String,
    /// Reference to the primary media asset.
    pub primary: AssetRef,
    /// Reference to the thumbnail/preview asset.
    pub secondary: AssetRef,
    pub duration_secs: f64,
    pub is_published: bool,
}

/// A committed ingestion, owned by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionRecord {
    pub id: RecordId,
    pub owner: OwnerId,
    pub title: String,
    pub description: String,
    pub primary: AssetRef,
    pub secondary: AssetRef,
    pub duration_secs: f64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

impl IngestionRecord {
    /// Materializes a record from its creation fields.
    pub fn from_new(id: RecordId, fields: NewIngestionRecord, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            owner: fields.owner,
            title: fields.title,
            description: fields.description,
            primary: fields.primary,
            secondary: fields.secondary,
            duration_secs: fields.duration_secs,
            is_published: fields.is_published,
            created_at,
        }
    }

    /// Returns true if either asset of this record lives under `store_id`.
    pub fn references(&self, store_id: &common::StoreId) -> bool {
        &self.primary.store_id == store_id || &self.secondary.store_id == store_id
    }
}
