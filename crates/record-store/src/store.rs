use async_trait::async_trait;
use common::{RecordId, StoreId};

use crate::{IngestionRecord, NewIngestionRecord, Result};

/// Core trait for record store implementations.
///
/// All implementations must be thread-safe (Send + Sync). `create` is atomic:
/// either the record exists afterwards or the call returned an error.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persists a new ingestion record.
    async fn create(&self, fields: NewIngestionRecord) -> Result<IngestionRecord>;

    /// Loads a record by ID.
    async fn get(&self, id: RecordId) -> Result<Option<IngestionRecord>>;

    /// Returns true if any record references the remote object `store_id`.
    async fn is_referenced(&self, store_id: &StoreId) -> Result<bool>;
}
