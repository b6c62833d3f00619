//! Media ingestion saga.
//!
//! An ingestion stores two local files (a primary video and a secondary
//! thumbnail) in a remote content store and then commits one record that
//! references both. The three steps run strictly in order:
//!
//! 1. store the primary asset
//! 2. store the secondary asset
//! 3. commit the record
//!
//! When a step fails, every asset already stored by the run is deleted in
//! reverse order. Deletes are best-effort; an asset whose delete fails is
//! reported as an orphan and later collected by the [`Reconciler`].
//!
//! Local material is consumed by the run: each file is removed after its
//! store attempt, whatever the result.

pub mod asset;
pub mod compensation;
pub mod coordinator;
pub mod error;
pub mod outcome;
pub mod reconcile;
pub mod request;
pub mod state;

pub use asset::{AssetRole, AssetUploadAttempt, LocalAsset, UploadStatus};
pub use compensation::{
    CompensationEntry, CompensationLog, CompensationOutcome, CompensationReport, compensate,
};
pub use coordinator::IngestionSaga;
pub use error::{PreconditionError, ReconcileError};
pub use outcome::{AbortReason, SagaOutcome, Severity};
pub use reconcile::{ReconcileConfig, Reconciler, SweepReport};
pub use request::{IngestRequest, IngestionMetadata, ValidatedIngest};
pub use state::{SagaState, SagaStep};
