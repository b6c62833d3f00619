//! Saga coordinator for media ingestion.

use std::time::Instant;

use asset_store::{AssetRef, AssetStore};
use record_store::{NewIngestionRecord, RecordStore, RecordStoreError};
use tokio_util::sync::CancellationToken;

use crate::asset::{AssetRole, AssetUploadAttempt, LocalAsset};
use crate::compensation::CompensationLog;
use crate::outcome::{AbortReason, SagaOutcome};
use crate::request::{IngestionMetadata, ValidatedIngest};
use crate::state::{SagaState, SagaStep};

/// Orchestrates media ingestion sagas.
///
/// The coordinator drives a strictly sequential 3-step saga (store primary →
/// store secondary → commit record) and deletes already-stored assets in
/// reverse order when a later step fails. It holds no per-run state, so one
/// coordinator serves any number of concurrent runs.
pub struct IngestionSaga<A, R>
where
    A: AssetStore,
    R: RecordStore,
{
    assets: A,
    records: R,
}

/// Mutable state of a single run: where it is, and what it must undo.
struct SagaRun {
    state: SagaState,
    log: CompensationLog,
}

impl SagaRun {
    fn new() -> Self {
        Self {
            state: SagaState::NotStarted,
            log: CompensationLog::new(),
        }
    }

    fn advance(&mut self, next: SagaState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal saga transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(from = %self.state, to = %next, "saga transition");
        self.state = next;
    }

    fn begin(&mut self, step: SagaStep) {
        self.advance(step.state());
        tracing::info!(step = step.as_str(), "saga step started");
    }
}

impl<A, R> IngestionSaga<A, R>
where
    A: AssetStore,
    R: RecordStore,
{
    /// Creates a new saga coordinator.
    pub fn new(assets: A, records: R) -> Self {
        Self { assets, records }
    }

    /// Returns the asset store used by this coordinator.
    pub fn assets(&self) -> &A {
        &self.assets
    }

    /// Returns the record store used by this coordinator.
    pub fn records(&self) -> &R {
        &self.records
    }

    /// Runs one ingestion to a terminal outcome.
    ///
    /// `cancel` is checked before each step starts; a step that has started
    /// is always awaited. Collaborator errors never escape as `Err`: every
    /// ending is one of the [`SagaOutcome`] variants.
    #[tracing::instrument(skip_all, fields(saga_type = "MediaIngestion", owner = %request.owner()))]
    pub async fn ingest(&self, request: ValidatedIngest, cancel: &CancellationToken) -> SagaOutcome {
        metrics::counter!("ingestion_sagas_total").increment(1);
        let started = Instant::now();

        let ValidatedIngest {
            primary,
            secondary,
            metadata,
            owner,
        } = request;
        let mut run = SagaRun::new();

        // 1. Store primary asset
        if cancel.is_cancelled() {
            release_all([primary, secondary]).await;
            return self
                .finish(run, started, cancelled(SagaStep::StorePrimary))
                .await;
        }
        run.begin(SagaStep::StorePrimary);
        let primary_ref =
            match AssetUploadAttempt::run(&self.assets, AssetRole::Primary, primary)
                .await
                .into_result()
            {
                Ok(asset) => {
                    run.log.record(asset.store_id.clone());
                    asset
                }
                Err(e) => {
                    tracing::warn!(step = SagaStep::StorePrimary.as_str(), error = %e, "saga step failed");
                    secondary.release().await;
                    return self
                        .finish(run, started, Ending::Abort(AbortReason::PrimaryStoreFailed(e)))
                        .await;
                }
            };

        // 2. Store secondary asset
        if cancel.is_cancelled() {
            secondary.release().await;
            return self
                .finish(run, started, cancelled(SagaStep::StoreSecondary))
                .await;
        }
        run.begin(SagaStep::StoreSecondary);
        let secondary_ref =
            match AssetUploadAttempt::run(&self.assets, AssetRole::Secondary, secondary)
                .await
                .into_result()
            {
                Ok(asset) => {
                    run.log.record(asset.store_id.clone());
                    asset
                }
                Err(e) => {
                    tracing::warn!(step = SagaStep::StoreSecondary.as_str(), error = %e, "saga step failed");
                    return self
                        .finish(run, started, Ending::Abort(AbortReason::SecondaryStoreFailed(e)))
                        .await;
                }
            };

        // 3. Commit the record
        if cancel.is_cancelled() {
            return self.finish(run, started, cancelled(SagaStep::Commit)).await;
        }
        run.begin(SagaStep::Commit);
        let fields = new_record(metadata, owner, primary_ref, secondary_ref);
        match self.records.create(fields).await {
            Ok(record) => {
                run.advance(SagaState::Committed);
                self.finish(run, started, Ending::Commit(record)).await
            }
            Err(e) => {
                tracing::warn!(step = SagaStep::Commit.as_str(), error = %e, "saga step failed");
                self.finish(run, started, Ending::CommitFailed(e)).await
            }
        }
    }

    /// Drains the compensation log where needed and records the outcome.
    async fn finish(&self, mut run: SagaRun, started: Instant, ending: Ending) -> SagaOutcome {
        let outcome = match ending {
            Ending::Commit(record) => SagaOutcome::Committed(record),
            Ending::Abort(reason) => {
                run.advance(SagaState::Compensating);
                let compensation = std::mem::take(&mut run.log).drain(&self.assets).await;
                run.advance(SagaState::Aborted);
                SagaOutcome::Aborted {
                    reason,
                    compensation,
                }
            }
            Ending::CommitFailed(reason) => {
                run.advance(SagaState::Compensating);
                let compensation = std::mem::take(&mut run.log).drain(&self.assets).await;
                run.advance(SagaState::CommitFailed);
                SagaOutcome::CommitFailedAfterStore {
                    reason,
                    compensation,
                }
            }
        };

        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("ingestion_saga_duration_seconds").record(duration);

        match &outcome {
            SagaOutcome::Committed(record) => {
                metrics::counter!("ingestion_committed_total").increment(1);
                tracing::info!(record_id = %record.id, duration, "saga committed");
            }
            SagaOutcome::Aborted { reason, .. } => {
                metrics::counter!("ingestion_aborted_total", "reason" => reason.as_str())
                    .increment(1);
                tracing::warn!(reason = %reason, duration, "saga aborted");
            }
            SagaOutcome::CommitFailedAfterStore { reason, .. } => {
                metrics::counter!("ingestion_commit_failed_total", "kind" => reason.kind())
                    .increment(1);
                tracing::warn!(reason = %reason, duration, "saga commit failed after store");
            }
        }

        if outcome.requires_reconciliation() {
            let orphans = outcome.orphans();
            metrics::counter!("ingestion_orphans_total").increment(orphans.len() as u64);
            tracing::error!(
                ?orphans,
                "orphan asset requires manual reconciliation"
            );
        }

        outcome
    }
}

enum Ending {
    Commit(record_store::IngestionRecord),
    Abort(AbortReason),
    CommitFailed(RecordStoreError),
}

fn cancelled(before: SagaStep) -> Ending {
    tracing::info!(step = before.as_str(), "saga cancelled before step");
    Ending::Abort(AbortReason::Cancelled { before })
}

async fn release_all<const N: usize>(assets: [LocalAsset; N]) {
    for asset in assets {
        asset.release().await;
    }
}

fn new_record(
    metadata: IngestionMetadata,
    owner: common::OwnerId,
    primary: AssetRef,
    secondary: AssetRef,
) -> NewIngestionRecord {
    NewIngestionRecord {
        owner,
        title: metadata.title,
        description: metadata.description,
        duration_secs: primary.duration_secs.unwrap_or(0.0),
        primary,
        secondary,
        is_published: true,
    }
}
