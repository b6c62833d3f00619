//! Background sweep for orphaned assets.
//!
//! Compensation is best-effort: a failed delete leaves an asset in the store
//! that no record references. The reconciler periodically lists stored
//! objects older than a grace period and deletes those no record points at.
//! The grace period keeps the sweep away from sagas still in flight.

use std::time::Duration;

use asset_store::{AssetInventory, AssetStore, AssetStoreError};
use chrono::Utc;
use record_store::RecordStore;
use tokio_util::sync::CancellationToken;

use crate::error::ReconcileError;

/// Default pause between sweeps: 5 minutes.
const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

/// Default minimum age before an unreferenced object is collected: 1 hour.
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(3600);

/// Sweep cadence and minimum object age.
///
/// The grace period must outlast the longest a saga can hold an uncommitted
/// asset, including every retry of every store call. [`Reconciler::new`]
/// raises both fields to their floors with [`ReconcileConfig::clamped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileConfig {
    pub interval: Duration,
    pub grace_period: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl ReconcileConfig {
    /// Shortest pause between sweeps.
    pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

    /// Shortest age at which an unreferenced object may be collected.
    pub const MIN_GRACE_PERIOD: Duration = Duration::from_secs(300);

    /// Returns the config with each field raised to its floor.
    pub fn clamped(self) -> Self {
        Self {
            interval: self.interval.max(Self::MIN_INTERVAL),
            grace_period: self.grace_period.max(Self::MIN_GRACE_PERIOD),
        }
    }
}

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub deleted: usize,
    pub failed: usize,
}

pub struct Reconciler<A, R>
where
    A: AssetStore + AssetInventory,
    R: RecordStore,
{
    assets: A,
    records: R,
    config: ReconcileConfig,
}

impl<A, R> Reconciler<A, R>
where
    A: AssetStore + AssetInventory,
    R: RecordStore,
{
    /// Creates a reconciler, clamping `config` to [`ReconcileConfig::clamped`].
    pub fn new(assets: A, records: R, config: ReconcileConfig) -> Self {
        let clamped = config.clamped();
        if clamped != config {
            tracing::warn!(
                requested_interval_ms = config.interval.as_millis() as u64,
                requested_grace_secs = config.grace_period.as_secs(),
                interval_ms = clamped.interval.as_millis() as u64,
                grace_secs = clamped.grace_period.as_secs(),
                "Reconcile config below minimum, clamped"
            );
        }
        let config = clamped;
        Self {
            assets,
            records,
            config,
        }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Runs a single sweep.
    ///
    /// Listing and lookup failures abort the sweep; a failed delete is
    /// counted and the sweep moves on to the next object.
    pub async fn sweep_once(&self) -> Result<SweepReport, ReconcileError> {
        let grace = chrono::Duration::from_std(self.config.grace_period)
            .unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(grace)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

        let candidates = self.assets.list_older_than(cutoff).await?;
        let mut report = SweepReport {
            examined: candidates.len(),
            ..SweepReport::default()
        };

        for object in candidates {
            if self.records.is_referenced(&object.store_id).await? {
                continue;
            }
            match self.assets.delete(&object.store_id).await {
                Ok(()) | Err(AssetStoreError::NotFound(_)) => {
                    tracing::info!(store_id = %object.store_id, stored_at = %object.stored_at, "Reconcile: deleted orphan asset");
                    report.deleted += 1;
                }
                Err(e) => {
                    tracing::warn!(store_id = %object.store_id, error = %e, "Reconcile: delete failed");
                    report.failed += 1;
                }
            }
        }

        metrics::counter!("reconcile_deleted_total").increment(report.deleted as u64);
        Ok(report)
    }

    /// Sweeps on a fixed interval until `cancel` is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            grace_secs = self.config.grace_period.as_secs(),
            "Reconciler started"
        );

        let mut interval = tokio::time::interval(self.config.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Reconciler stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.sweep_once().await {
                        Ok(report) if report.deleted > 0 || report.failed > 0 => {
                            tracing::info!(
                                examined = report.examined,
                                deleted = report.deleted,
                                failed = report.failed,
                                "Reconcile: sweep finished"
                            );
                        }
                        Ok(_) => tracing::debug!("Reconcile: nothing to collect"),
                        Err(e) => tracing::error!(error = %e, "Reconcile: sweep failed"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use asset_store::{InMemoryAssetStore, StoreId};
    use chrono::Duration as ChronoDuration;
    use record_store::{InMemoryRecordStore, NewIngestionRecord, RecordStoreError};

    use super::*;

    fn asset(id: &str) -> asset_store::AssetRef {
        asset_store::AssetRef {
            url: format!("memory://assets/{id}"),
            store_id: StoreId::new(id),
            bytes: 1,
            duration_secs: None,
        }
    }

    fn reconciler(
        assets: &InMemoryAssetStore,
        records: &InMemoryRecordStore,
    ) -> Reconciler<InMemoryAssetStore, InMemoryRecordStore> {
        Reconciler::new(assets.clone(), records.clone(), ReconcileConfig::default())
    }

    #[tokio::test]
    async fn test_sweep_deletes_old_unreferenced_objects() {
        let assets = InMemoryAssetStore::new();
        let records = InMemoryRecordStore::new();
        let old = Utc::now() - ChronoDuration::hours(2);
        assets.insert_object(StoreId::new("orphan"), old).await;
        assets.insert_object(StoreId::new("video"), old).await;
        assets.insert_object(StoreId::new("thumb"), old).await;
        records
            .create(NewIngestionRecord {
                owner: common::OwnerId::new(),
                title: "t".into(),
                description: "d".into(),
                primary: asset("video"),
                secondary: asset("thumb"),
                duration_secs: 0.0,
                is_published: true,
            })
            .await
            .unwrap();

        let report = reconciler(&assets, &records).sweep_once().await.unwrap();

        assert_eq!(
            report,
            SweepReport {
                examined: 3,
                deleted: 1,
                failed: 0
            }
        );
        assert!(!assets.has_object(&StoreId::new("orphan")).await);
        assert!(assets.has_object(&StoreId::new("video")).await);
        assert!(assets.has_object(&StoreId::new("thumb")).await);
    }

    #[tokio::test]
    async fn test_sweep_respects_grace_period() {
        let assets = InMemoryAssetStore::new();
        let records = InMemoryRecordStore::new();
        assets
            .insert_object(StoreId::new("in-flight"), Utc::now())
            .await;

        let report = reconciler(&assets, &records).sweep_once().await.unwrap();

        assert_eq!(report.examined, 0);
        assert!(assets.has_object(&StoreId::new("in-flight")).await);
    }

    #[tokio::test]
    async fn test_failed_delete_is_counted() {
        let assets = InMemoryAssetStore::new();
        let records = InMemoryRecordStore::new();
        let old = Utc::now() - ChronoDuration::hours(2);
        assets.insert_object(StoreId::new("a"), old).await;
        assets.insert_object(StoreId::new("b"), old).await;
        assets
            .fail_delete_of(&StoreId::new("a"), AssetStoreError::Unreachable("down".into()))
            .await;

        let report = reconciler(&assets, &records).sweep_once().await.unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.failed, 1);
        assert!(assets.has_object(&StoreId::new("a")).await);
    }

    #[test]
    fn test_zero_config_is_clamped() {
        let zero = ReconcileConfig {
            interval: Duration::ZERO,
            grace_period: Duration::ZERO,
        };

        let reconciler = Reconciler::new(InMemoryAssetStore::new(), InMemoryRecordStore::new(), zero);

        assert_eq!(reconciler.config().interval, ReconcileConfig::MIN_INTERVAL);
        assert_eq!(reconciler.config().grace_period, ReconcileConfig::MIN_GRACE_PERIOD);
        assert_eq!(ReconcileConfig::default().clamped(), ReconcileConfig::default());
    }

    #[tokio::test]
    async fn test_zero_grace_keeps_fresh_objects() {
        let assets = InMemoryAssetStore::new();
        let records = InMemoryRecordStore::new();
        assets
            .insert_object(StoreId::new("in-flight"), Utc::now() - ChronoDuration::seconds(30))
            .await;
        let reconciler = Reconciler::new(
            assets.clone(),
            records,
            ReconcileConfig {
                interval: Duration::ZERO,
                grace_period: Duration::ZERO,
            },
        );

        let report = reconciler.sweep_once().await.unwrap();

        assert_eq!(report.examined, 0);
        assert!(assets.has_object(&StoreId::new("in-flight")).await);
    }

    #[tokio::test]
    async fn test_run_with_zero_interval_stops_on_cancel() {
        let reconciler = Reconciler::new(
            InMemoryAssetStore::new(),
            InMemoryRecordStore::new(),
            ReconcileConfig {
                interval: Duration::ZERO,
                grace_period: Duration::ZERO,
            },
        );
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            stopper.cancel();
        });

        tokio::time::timeout(Duration::from_secs(1), reconciler.run(cancel))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let assets = InMemoryAssetStore::new();
        let records = InMemoryRecordStore::new();
        let reconciler = Reconciler::new(
            assets,
            records,
            ReconcileConfig {
                interval: Duration::from_millis(10),
                grace_period: Duration::ZERO,
            },
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), reconciler.run(cancel))
            .await
            .unwrap();
    }

    #[test]
    fn test_record_error_converts() {
        let err: ReconcileError = RecordStoreError::Unavailable("db".into()).into();
        assert!(err.to_string().contains("db"));
    }
}
