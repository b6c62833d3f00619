use thiserror::Error;

use crate::StoreId;

/// Errors returned by an asset store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetStoreError {
    /// The store could not be reached (network, I/O, backend down).
    #[error("Asset store unreachable: {0}")]
    Unreachable(String),

    /// The store refused the request.
    #[error("Asset store rejected the request: {0}")]
    Rejected(String),

    /// The call did not complete within the allotted time.
    #[error("Asset store call timed out")]
    Timeout,

    /// No object exists under the given ID.
    #[error("Asset not found: {0}")]
    NotFound(StoreId),
}

impl AssetStoreError {
    /// Returns true if repeating the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AssetStoreError::Unreachable(_) | AssetStoreError::Timeout)
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AssetStoreError::Unreachable(_) => "unreachable",
            AssetStoreError::Rejected(_) => "rejected",
            AssetStoreError::Timeout => "timeout",
            AssetStoreError::NotFound(_) => "not_found",
        }
    }
}

/// Result type for asset store operations.
pub type Result<T> = std::result::Result<T, AssetStoreError>;
