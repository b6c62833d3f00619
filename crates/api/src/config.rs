//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use asset_store::RetryPolicy;
use ingestion::ReconcileConfig;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `UPLOAD_DIR`: where incoming files are spooled (default: `"./uploads/tmp"`)
/// - `ASSET_STORE_DIR`: root of the filesystem content store (default: `"./uploads/assets"`)
/// - `ASSET_BASE_URL`: public prefix of stored asset URLs (default: `"http://localhost:3000/assets"`)
/// - `DATABASE_URL`: PostgreSQL URL; unset selects the in-memory record store
/// - `ASSET_STORE_MAX_RETRIES`: extra attempts on transient store errors (default: `3`)
/// - `ASSET_STORE_TIMEOUT_MS`: per-call store timeout (default: `30000`)
/// - `RECONCILE_INTERVAL_SECS`: pause between orphan sweeps (default: `300`)
/// - `RECONCILE_GRACE_SECS`: minimum orphan age before collection (default: `3600`)
/// - `MAX_UPLOAD_BYTES`: request body limit for uploads (default: 512 MiB)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub upload_dir: PathBuf,
    pub asset_store_dir: PathBuf,
    pub asset_base_url: String,
    pub database_url: Option<String>,
    pub asset_store_max_retries: u32,
    pub asset_store_timeout: Duration,
    pub reconcile_interval: Duration,
    pub reconcile_grace: Duration,
    pub max_upload_bytes: usize,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_or("HOST", defaults.host),
            port: env_or("PORT", defaults.port),
            log_level: env_or("RUST_LOG", defaults.log_level),
            upload_dir: env_or("UPLOAD_DIR", defaults.upload_dir),
            asset_store_dir: env_or("ASSET_STORE_DIR", defaults.asset_store_dir),
            asset_base_url: env_or("ASSET_BASE_URL", defaults.asset_base_url),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            asset_store_max_retries: env_or(
                "ASSET_STORE_MAX_RETRIES",
                defaults.asset_store_max_retries,
            ),
            asset_store_timeout: Duration::from_millis(env_or("ASSET_STORE_TIMEOUT_MS", 30_000)),
            reconcile_interval: Duration::from_secs(env_or("RECONCILE_INTERVAL_SECS", 300)),
            reconcile_grace: Duration::from_secs(env_or("RECONCILE_GRACE_SECS", 3600)),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Retry policy for the asset store client.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.asset_store_max_retries,
            call_timeout: Some(self.asset_store_timeout),
            ..RetryPolicy::default()
        }
    }

    /// Reconciler settings. The grace period is raised to at least four
    /// times the longest a retried store call can run, so a sweep never
    /// races a saga that is still uploading.
    pub fn reconcile_config(&self) -> ReconcileConfig {
        let floor = self
            .retry_policy()
            .worst_case_duration()
            .map(|budget| budget.saturating_mul(4))
            .unwrap_or(Duration::ZERO);
        ReconcileConfig {
            interval: self.reconcile_interval,
            grace_period: self.reconcile_grace.max(floor),
        }
        .clamped()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            upload_dir: PathBuf::from("./uploads/tmp"),
            asset_store_dir: PathBuf::from("./uploads/assets"),
            asset_base_url: "http://localhost:3000/assets".to_string(),
            database_url: None,
            asset_store_max_retries: 3,
            asset_store_timeout: Duration::from_secs(30),
            reconcile_interval: Duration::from_secs(300),
            reconcile_grace: Duration::from_secs(3600),
            max_upload_bytes: 512 * 1024 * 1024,
        }
    }
}
