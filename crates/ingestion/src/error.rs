//! Ingestion error types.

use std::path::PathBuf;

use asset_store::AssetStoreError;
use record_store::RecordStoreError;
use thiserror::Error;

/// Input rejected before the saga starts. No side effects exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    /// The primary media file was not supplied.
    #[error("Video file is required.")]
    MissingPrimary,

    /// The thumbnail/preview file was not supplied.
    #[error("Thumbnail file is required.")]
    MissingSecondary,

    /// A required metadata field is absent or blank.
    #[error("Title and description are required and cannot be empty.")]
    EmptyField(&'static str),

    /// The local material does not exist or cannot be read.
    #[error("Local material is not readable: {0}")]
    Unreadable(PathBuf),

    /// The local material exists but holds no bytes.
    #[error("Local material is empty: {0}")]
    EmptyMaterial(PathBuf),
}

/// Errors that abort a reconciliation sweep.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Listing the remote store failed.
    #[error("Asset store error: {0}")]
    Assets(#[from] AssetStoreError),

    /// The record store could not be queried.
    #[error("Record store error: {0}")]
    Records(#[from] RecordStoreError),
}
