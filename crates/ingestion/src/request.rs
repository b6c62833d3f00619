//! Ingestion requests and precondition checks.
//!
//! A request is validated before the saga is entered. Rejection here is a
//! precondition failure: nothing has been stored, and any local material
//! already handed over is deleted when the request is dropped.

use common::OwnerId;
use serde::{Deserialize, Serialize};

use crate::asset::LocalAsset;
use crate::error::PreconditionError;

/// Caller-supplied descriptive fields of an ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionMetadata {
    pub title: String,
    pub description: String,
}

impl IngestionMetadata {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    /// Rejects blank fields. Whitespace-only counts as blank.
    pub fn validate(&self) -> Result<(), PreconditionError> {
        if self.title.trim().is_empty() {
            return Err(PreconditionError::EmptyField("title"));
        }
        if self.description.trim().is_empty() {
            return Err(PreconditionError::EmptyField("description"));
        }
        Ok(())
    }
}

/// An unvalidated ingestion request as assembled by the caller.
#[derive(Debug)]
pub struct IngestRequest {
    pub primary: Option<LocalAsset>,
    pub secondary: Option<LocalAsset>,
    pub metadata: IngestionMetadata,
    pub owner: OwnerId,
}

impl IngestRequest {
    pub fn new(
        primary: Option<LocalAsset>,
        secondary: Option<LocalAsset>,
        metadata: IngestionMetadata,
        owner: OwnerId,
    ) -> Self {
        Self {
            primary,
            secondary,
            metadata,
            owner,
        }
    }

    /// Checks every precondition and produces a request the saga accepts.
    pub async fn validate(self) -> Result<ValidatedIngest, PreconditionError> {
        self.metadata.validate()?;

        let primary = self.primary.ok_or(PreconditionError::MissingPrimary)?;
        let secondary = self.secondary.ok_or(PreconditionError::MissingSecondary)?;

        primary.check().await?;
        secondary.check().await?;

        Ok(ValidatedIngest {
            primary,
            secondary,
            metadata: self.metadata,
            owner: self.owner,
        })
    }
}

/// A request that passed every precondition. Only obtainable via
/// [`IngestRequest::validate`].
#[derive(Debug)]
pub struct ValidatedIngest {
    pub(crate) primary: LocalAsset,
    pub(crate) secondary: LocalAsset,
    pub(crate) metadata: IngestionMetadata,
    pub(crate) owner: OwnerId,
}

impl ValidatedIngest {
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn metadata(&self) -> &IngestionMetadata {
        &self.metadata
    }
}
