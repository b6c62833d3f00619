//! Shared identifier types for the media ingestion workspace.

pub mod types;

pub use types::{AssetRef, OwnerId, RecordId, StoreId};
