//! Retry, backoff and timeout policy for asset store calls.
//!
//! [`RetryingAssetStore`] wraps any [`AssetStore`] and retries transient
//! failures (`Unreachable`, `Timeout`) with bounded exponential backoff and
//! full jitter. Each attempt is capped by an optional per-call timeout.
//! `Rejected` and `NotFound` are returned on the first occurrence.
//!
//! A timed-out `store` is not retried: the abandoned upload may still land,
//! and a second attempt would leave a duplicate the caller never hears of.
//! `delete` and listing are idempotent and retry on both transient errors.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;

use crate::store::{AssetInventory, AssetStore, StoredObject};
use crate::{AssetRef, AssetStoreError, Result, StoreId};

/// Tunable parameters for retrying asset store calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Extra attempts after the first one fails.
    pub max_retries: u32,
    /// Backoff ceiling before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single backoff.
    pub max_delay: Duration,
    /// Factor by which the backoff ceiling grows after each failure.
    pub multiplier: f64,
    /// Upper bound on a single attempt; `None` waits indefinitely.
    pub call_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            call_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl RetryPolicy {
    /// A policy that performs exactly one attempt with no timeout.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            call_timeout: None,
            ..Default::default()
        }
    }

    /// Backoff ceiling before retry number `retry` (0-based), clamped to `max_delay`.
    pub fn backoff_ceiling(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.min(i32::MAX as u32) as i32);
        let ceiling_ms = self.initial_delay.as_millis() as f64 * factor;
        let max_ms = self.max_delay.as_millis() as f64;
        Duration::from_millis(ceiling_ms.min(max_ms) as u64)
    }

    /// Longest a single decorated call can take: every attempt running to
    /// its timeout plus every backoff at its ceiling. `None` without a timeout.
    pub fn worst_case_duration(&self) -> Option<Duration> {
        let limit = self.call_timeout?;
        let attempts = self.max_retries.saturating_add(1);
        let backoff = (0..self.max_retries)
            .map(|retry| self.backoff_ceiling(retry))
            .fold(Duration::ZERO, Duration::saturating_add);
        Some(limit.saturating_mul(attempts).saturating_add(backoff))
    }

    /// Full-jitter delay: uniform in `[0, backoff_ceiling(retry)]`.
    pub fn jittered_delay(&self, retry: u32) -> Duration {
        let ceiling = self.backoff_ceiling(retry).as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=ceiling))
    }
}

/// Asset store decorator applying a [`RetryPolicy`] to every call.
#[derive(Debug, Clone)]
pub struct RetryingAssetStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> RetryingAssetStore<S> {
    /// Wraps `inner` with the given policy.
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns the active policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn attempt<T, Fut>(&self, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match self.policy.call_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .unwrap_or(Err(AssetStoreError::Timeout)),
            None => fut.await,
        }
    }

    async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        retryable: fn(&AssetStoreError) -> bool,
        mut call: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0u32;

        loop {
            match self.attempt(call()).await {
                Ok(value) => return Ok(value),
                Err(e) if retryable(&e) && retry < self.policy.max_retries => {
                    let delay = self.policy.jittered_delay(retry);
                    retry += 1;
                    metrics::counter!("asset_store_retries_total", "operation" => operation)
                        .increment(1);
                    tracing::warn!(
                        operation,
                        attempt = retry,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "asset store call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if retry > 0 {
                        tracing::warn!(operation, attempts = retry + 1, error = %e, "asset store call gave up");
                    }
                    return Err(e);
                }
            }
        }
    }
}

fn retryable_store(error: &AssetStoreError) -> bool {
    matches!(error, AssetStoreError::Unreachable(_))
}

#[async_trait]
impl<S: AssetStore> AssetStore for RetryingAssetStore<S> {
    async fn store(&self, path: &Path) -> Result<AssetRef> {
        self.run("store", retryable_store, || self.inner.store(path)).await
    }

    async fn delete(&self, store_id: &StoreId) -> Result<()> {
        self.run("delete", AssetStoreError::is_transient, || {
            self.inner.delete(store_id)
        })
        .await
    }
}

#[async_trait]
impl<S: AssetInventory> AssetInventory for RetryingAssetStore<S> {
    async fn list_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<StoredObject>> {
        self.run("list", AssetStoreError::is_transient, || {
            self.inner.list_older_than(cutoff)
        })
        .await
    }
}
