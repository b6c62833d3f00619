//! Compensation log and compensating deletes.

use asset_store::{AssetStore, AssetStoreError, StoreId};
use serde::{Deserialize, Serialize};

/// Store IDs that were successfully stored and are not yet referenced by a
/// committed record, in the order they were stored.
///
/// Lives only for the duration of one saga run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompensationLog {
    stored: Vec<StoreId>,
}

impl CompensationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an ID after its upload succeeded.
    pub fn record(&mut self, store_id: StoreId) {
        self.stored.push(store_id);
    }

    pub fn len(&self) -> usize {
        self.stored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stored.is_empty()
    }

    /// IDs in the order they were stored.
    pub fn entries(&self) -> &[StoreId] {
        &self.stored
    }

    /// Deletes every logged ID, consuming the log.
    pub async fn drain<A: AssetStore>(self, store: &A) -> CompensationReport {
        compensate(store, self.stored).await
    }
}

/// Result of one compensating delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum CompensationOutcome {
    /// The object is gone (deleted now, or already absent).
    Deleted,
    /// The delete failed; the object may still exist.
    DeleteFailed(String),
}

/// One entry of a compensation report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationEntry {
    pub store_id: StoreId,
    #[serde(flatten)]
    pub outcome: CompensationOutcome,
}

/// Per-ID outcomes of a compensation pass, in the order deletes were attempted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompensationReport {
    entries: Vec<CompensationEntry>,
}

impl CompensationReport {
    /// A report for a run that had nothing to compensate.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[CompensationEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if every attempted delete succeeded.
    pub fn is_complete(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.outcome == CompensationOutcome::Deleted)
    }

    /// IDs whose compensating delete failed and may be orphaned remotely.
    pub fn orphans(&self) -> Vec<&StoreId> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, CompensationOutcome::DeleteFailed(_)))
            .map(|e| &e.store_id)
            .collect()
    }
}

/// Deletes `stored` (given in store order) in reverse order.
///
/// Each delete is attempted exactly once and independently of the others.
/// `NotFound` counts as deleted.
pub async fn compensate<A: AssetStore>(store: &A, stored: Vec<StoreId>) -> CompensationReport {
    let mut entries = Vec::with_capacity(stored.len());

    for store_id in stored.into_iter().rev() {
        let outcome = match store.delete(&store_id).await {
            Ok(()) => CompensationOutcome::Deleted,
            Err(AssetStoreError::NotFound(_)) => {
                tracing::info!(%store_id, "compensating delete: asset already absent");
                CompensationOutcome::Deleted
            }
            Err(e) => {
                tracing::error!(%store_id, error = %e, "compensating delete failed");
                CompensationOutcome::DeleteFailed(e.to_string())
            }
        };

        let label = match outcome {
            CompensationOutcome::Deleted => "deleted",
            CompensationOutcome::DeleteFailed(_) => "delete_failed",
        };
        metrics::counter!("ingestion_compensation_deletes_total", "outcome" => label).increment(1);

        entries.push(CompensationEntry { store_id, outcome });
    }

    CompensationReport { entries }
}
