//! Ingestion saga state machine.

use serde::{Deserialize, Serialize};

/// The state of an ingestion saga in its lifecycle.
///
/// State transitions:
/// ```text
/// NotStarted ──► StoringPrimary ──► StoringSecondary ──► Committing ──► Committed
///      │               │                   │                 │
///      │               └─────────┬─────────┴────────┬────────┘
///      │                         ▼                  ▼
///      └──────────────────► Compensating ──┬──► Aborted
///                                          └──► CommitFailed
/// ```
///
/// A failure while storing the primary asset, or cancellation before any
/// step, passes through `Compensating` with an empty compensation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    /// Saga has not started yet.
    #[default]
    NotStarted,

    /// The primary asset is being uploaded.
    StoringPrimary,

    /// The secondary asset is being uploaded.
    StoringSecondary,

    /// The record is being written to the record store.
    Committing,

    /// Stored assets are being deleted after a failure or cancellation.
    Compensating,

    /// The record was created (terminal state).
    Committed,

    /// The saga stopped before commit; compensation ran (terminal state).
    Aborted,

    /// The commit failed after both assets were stored (terminal state).
    CommitFailed,
}

impl SagaState {
    /// Returns true if the saga may move from `self` to `next`.
    pub fn can_transition_to(&self, next: SagaState) -> bool {
        use SagaState::*;
        matches!(
            (self, next),
            (NotStarted, StoringPrimary)
                | (StoringPrimary, StoringSecondary)
                | (StoringSecondary, Committing)
                | (Committing, Committed)
                | (NotStarted | StoringPrimary | StoringSecondary | Committing, Compensating)
                | (Compensating, Aborted | CommitFailed)
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaState::Committed | SagaState::Aborted | SagaState::CommitFailed
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::NotStarted => "NotStarted",
            SagaState::StoringPrimary => "StoringPrimary",
            SagaState::StoringSecondary => "StoringSecondary",
            SagaState::Committing => "Committing",
            SagaState::Compensating => "Compensating",
            SagaState::Committed => "Committed",
            SagaState::Aborted => "Aborted",
            SagaState::CommitFailed => "CommitFailed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The three forward steps of the saga, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SagaStep {
    StorePrimary,
    StoreSecondary,
    Commit,
}

impl SagaStep {
    /// The state the saga is in while this step runs.
    pub fn state(&self) -> SagaState {
        match self {
            SagaStep::StorePrimary => SagaState::StoringPrimary,
            SagaStep::StoreSecondary => SagaState::StoringSecondary,
            SagaStep::Commit => SagaState::Committing,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStep::StorePrimary => "store_primary",
            SagaStep::StoreSecondary => "store_secondary",
            SagaStep::Commit => "commit",
        }
    }
}

impl std::fmt::Display for SagaStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
