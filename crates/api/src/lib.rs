//! HTTP host for the media ingestion saga.
//!
//! Accepts multipart uploads at `POST /videos`, runs each through the
//! ingestion saga and maps the outcome to a response. Also serves health
//! and Prometheus metrics endpoints.

pub mod config;
pub mod error;
pub mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use asset_store::AssetStore;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use ingestion::IngestionSaga;
use metrics_exporter_prometheus::PrometheusHandle;
use record_store::RecordStore;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use routes::videos::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<A, R>(
    state: Arc<AppState<A, R>>,
    metrics_handle: PrometheusHandle,
    max_upload_bytes: usize,
) -> Router
where
    A: AssetStore + 'static,
    R: RecordStore + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let upload_router = Router::new()
        .route("/videos", post(routes::videos::upload::<A, R>))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .with_state(state);

    Router::new()
        .route("/health", get(routes::health::check))
        .merge(upload_router)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state around the given stores.
pub fn create_default_state<A, R>(
    assets: A,
    records: R,
    upload_dir: impl Into<PathBuf>,
    shutdown: CancellationToken,
) -> Arc<AppState<A, R>>
where
    A: AssetStore,
    R: RecordStore,
{
    Arc::new(AppState {
        saga: IngestionSaga::new(assets, records),
        upload_dir: upload_dir.into(),
        shutdown,
    })
}
