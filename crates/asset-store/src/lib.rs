//! Remote asset store client.
//!
//! The ingestion saga talks to a content store through the [`AssetStore`]
//! trait: `store` uploads local material and returns a stable reference,
//! `delete` removes an object by its store-assigned ID. Retry, backoff and
//! per-call timeouts are the client's concern and live in
//! [`RetryingAssetStore`]; the saga only ever sees the final result.

pub mod error;
pub mod local;
pub mod memory;
pub mod retry;
pub mod store;

pub use common::{AssetRef, StoreId};
pub use error::{AssetStoreError, Result};
pub use local::{LocalAssetStore, PARTIAL_PREFIX};
pub use memory::InMemoryAssetStore;
pub use retry::{RetryPolicy, RetryingAssetStore};
pub use store::{AssetInventory, AssetStore, StoredObject};
