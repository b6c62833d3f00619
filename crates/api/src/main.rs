//! API server entry point.

use api::config::Config;
use asset_store::{LocalAssetStore, RetryingAssetStore};
use ingestion::Reconciler;
use metrics_exporter_prometheus::PrometheusHandle;
use record_store::{InMemoryRecordStore, PostgresRecordStore, RecordStore};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve<R>(config: Config, records: R, metrics_handle: PrometheusHandle)
where
    R: RecordStore + Clone + 'static,
{
    // 4. Asset store: filesystem content store behind the retry policy
    let local = LocalAssetStore::new(&config.asset_store_dir, config.asset_base_url.clone())
        .await
        .expect("failed to open asset store");
    let assets = RetryingAssetStore::new(local, config.retry_policy());

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .expect("failed to create upload directory");

    // 5. Orphan reconciliation in the background
    let shutdown = CancellationToken::new();
    let reconciler = Reconciler::new(assets.clone(), records.clone(), config.reconcile_config());
    let reconcile_task = tokio::spawn({
        let cancel = shutdown.clone();
        async move { reconciler.run(cancel).await }
    });

    // 6. Build the application
    let state = api::create_default_state(assets, records, &config.upload_dir, shutdown.clone());
    let app = api::create_app(state, metrics_handle, config.max_upload_bytes)
        .nest_service("/assets", ServeDir::new(&config.asset_store_dir));

    // 7. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move {
                shutdown_signal().await;
                shutdown.cancel();
            }
        })
        .await
        .expect("server error");

    shutdown.cancel();
    if let Err(e) = reconcile_task.await {
        tracing::warn!(error = %e, "reconciler task ended abnormally");
    }

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Record store: PostgreSQL when configured, otherwise in-memory
    let config = Config::from_env();
    match config.database_url.clone() {
        Some(url) => {
            let records = PostgresRecordStore::connect(&url)
                .await
                .expect("failed to connect to database");
            records
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL record store");
            serve(config, records, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, records are kept in memory");
            serve(config, InMemoryRecordStore::new(), metrics_handle).await;
        }
    }
}
