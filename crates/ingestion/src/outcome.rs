//! Terminal outcomes of an ingestion saga.

use asset_store::{AssetStoreError, StoreId};
use record_store::{IngestionRecord, RecordStoreError};

use crate::compensation::CompensationReport;
use crate::state::SagaStep;

/// Why a saga stopped before attempting the commit.
#[derive(Debug, Clone, PartialEq)]
pub enum AbortReason {
    /// The primary upload failed. Nothing was stored.
    PrimaryStoreFailed(AssetStoreError),
    /// The secondary upload failed after the primary was stored.
    SecondaryStoreFailed(AssetStoreError),
    /// The caller withdrew before `before` started.
    Cancelled { before: SagaStep },
}

impl AbortReason {
    /// Short label used for metrics and structured logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            AbortReason::PrimaryStoreFailed(_) => "primary_store_failed",
            AbortReason::SecondaryStoreFailed(_) => "secondary_store_failed",
            AbortReason::Cancelled { .. } => "cancelled",
        }
    }
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::PrimaryStoreFailed(e) => write!(f, "primary store failed: {e}"),
            AbortReason::SecondaryStoreFailed(e) => write!(f, "secondary store failed: {e}"),
            AbortReason::Cancelled { before } => write!(f, "cancelled before {before}"),
        }
    }
}

/// How urgently a terminal outcome needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// The record was committed.
    None,
    /// Aborted and fully compensated; nothing is left behind.
    Aborted,
    /// Commit failed after storing; both assets were deleted.
    CommitFailed,
    /// A compensating delete failed; an orphan asset requires manual reconciliation.
    OrphanedAssets,
}

/// The single value a saga run returns to its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SagaOutcome {
    /// Both assets are stored and the record references them.
    Committed(IngestionRecord),

    /// The saga stopped before commit; stored assets were compensated.
    Aborted {
        reason: AbortReason,
        compensation: CompensationReport,
    },

    /// Both assets were stored but the record could not be created.
    CommitFailedAfterStore {
        reason: RecordStoreError,
        compensation: CompensationReport,
    },
}

impl SagaOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, SagaOutcome::Committed(_))
    }

    /// Returns the committed record, if any.
    pub fn record(&self) -> Option<&IngestionRecord> {
        match self {
            SagaOutcome::Committed(record) => Some(record),
            _ => None,
        }
    }

    /// Returns the compensation report of a non-committed outcome.
    pub fn compensation(&self) -> Option<&CompensationReport> {
        match self {
            SagaOutcome::Committed(_) => None,
            SagaOutcome::Aborted { compensation, .. }
            | SagaOutcome::CommitFailedAfterStore { compensation, .. } => Some(compensation),
        }
    }

    /// Store IDs that may remain in the remote store with no referencing record.
    pub fn orphans(&self) -> Vec<&StoreId> {
        self.compensation()
            .map(CompensationReport::orphans)
            .unwrap_or_default()
    }

    /// True if an orphan asset requires manual or automated reconciliation.
    pub fn requires_reconciliation(&self) -> bool {
        !self.orphans().is_empty()
    }

    pub fn severity(&self) -> Severity {
        if self.requires_reconciliation() {
            return Severity::OrphanedAssets;
        }
        match self {
            SagaOutcome::Committed(_) => Severity::None,
            SagaOutcome::Aborted { .. } => Severity::Aborted,
            SagaOutcome::CommitFailedAfterStore { .. } => Severity::CommitFailed,
        }
    }

    /// True if the caller may resubmit the same ingestion end to end.
    ///
    /// Local material is consumed by every run, so a retry always needs
    /// fresh material; this only says the remote side is clean.
    pub fn is_safe_to_retry(&self) -> bool {
        !self.is_committed() && !self.requires_reconciliation()
    }
}

impl std::fmt::Display for SagaOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SagaOutcome::Committed(record) => return write!(f, "committed record {}", record.id),
            SagaOutcome::Aborted { reason, .. } => write!(f, "aborted: {reason}")?,
            SagaOutcome::CommitFailedAfterStore { reason, .. } => {
                write!(f, "commit failed after store: {reason}")?
            }
        }
        if self.requires_reconciliation() {
            let orphans: Vec<&str> = self.orphans().into_iter().map(StoreId::as_str).collect();
            write!(
                f,
                "; orphan asset requires manual reconciliation: {}",
                orphans.join(", ")
            )?;
        }
        Ok(())
    }
}
