//! System of record for committed media ingestions.
//!
//! The ingestion saga writes exactly one [`IngestionRecord`] per successful
//! run through [`RecordStore::create`]. The reconciliation sweep asks
//! [`RecordStore::is_referenced`] whether a remote object still has an owner.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use error::{RecordStoreError, Result};
pub use memory::InMemoryRecordStore;
pub use postgres::PostgresRecordStore;
pub use record::{IngestionRecord, NewIngestionRecord};
pub use store::RecordStore;
