//! Media upload endpoint.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use asset_store::AssetStore;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use common::OwnerId;
use ingestion::{IngestRequest, IngestionMetadata, IngestionSaga, LocalAsset};
use record_store::RecordStore;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ApiError, IngestResponse};

/// Header carrying the authenticated caller, set by the upstream auth layer.
pub const OWNER_HEADER: &str = "x-user-id";

/// Shared application state accessible from all handlers.
pub struct AppState<A: AssetStore, R: RecordStore> {
    pub saga: IngestionSaga<A, R>,
    /// Directory incoming files are spooled into before ingestion.
    pub upload_dir: PathBuf,
    /// Cancelled on shutdown; each upload runs under a child token.
    pub shutdown: CancellationToken,
}

fn owner_from(headers: &HeaderMap) -> Result<OwnerId, ApiError> {
    headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .map(OwnerId::from_uuid)
        .ok_or(ApiError::Unauthorized)
}

/// Spool name: a fresh UUID plus the client's extension when it is plain ASCII.
fn spool_name(file_name: Option<&str>) -> String {
    let id = Uuid::new_v4().simple();
    let ext = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match ext {
        Some(ext) => format!("{id}.{}", ext.to_ascii_lowercase()),
        None => id.to_string(),
    }
}

/// Streams one file field to disk. The handle is taken before the first
/// write, so a failed or abandoned spool leaves nothing behind.
async fn spool(mut field: Field<'_>, upload_dir: &Path) -> Result<LocalAsset, ApiError> {
    let asset = LocalAsset::new(upload_dir.join(spool_name(field.file_name())));

    let mut file = tokio::fs::File::create(asset.path())
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to create spool file: {e}")))?;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart: {e}")))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to write spool file: {e}")))?;
    }
    file.flush()
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to write spool file: {e}")))?;

    Ok(asset)
}

async fn text(field: Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart: {e}")))
}

/// POST /videos: spools `videoFile` and `thumbnail`, then runs the ingestion saga.
#[tracing::instrument(skip_all)]
pub async fn upload<A, R>(
    State(state): State<Arc<AppState<A, R>>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<IngestResponse, ApiError>
where
    A: AssetStore + 'static,
    R: RecordStore + 'static,
{
    let owner = owner_from(&headers)?;

    let mut video = None;
    let mut thumbnail = None;
    let mut title = String::new();
    let mut description = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "videoFile" => video = Some(spool(field, &state.upload_dir).await?),
            "thumbnail" => thumbnail = Some(spool(field, &state.upload_dir).await?),
            "title" => title = text(field).await?,
            "description" => description = text(field).await?,
            _ => {}
        }
    }

    let request = IngestRequest::new(
        video,
        thumbnail,
        IngestionMetadata::new(title, description),
        owner,
    )
    .validate()
    .await?;

    tracing::info!(%owner, "upload accepted");

    let cancel = state.shutdown.child_token();
    let outcome = state.saga.ingest(request, &cancel).await;
    Ok(IngestResponse(outcome))
}
