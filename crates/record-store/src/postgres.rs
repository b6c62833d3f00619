use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AssetRef, OwnerId, RecordId, StoreId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{IngestionRecord, NewIngestionRecord, RecordStore, RecordStoreError, Result};

const SELECT_COLUMNS: &str = r#"
    id, owner_id, title, description,
    video_url, video_store_id, video_bytes,
    thumbnail_url, thumbnail_store_id, thumbnail_bytes,
    duration_secs, is_published, created_at
"#;

/// PostgreSQL-backed record store implementation.
#[derive(Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// Creates a new PostgreSQL record store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and returns a store backed by a fresh pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_record(row: PgRow) -> Result<IngestionRecord> {
        let bytes = |column: &str| -> Result<u64> {
            let value: i64 = row.try_get(column)?;
            u64::try_from(value).map_err(|_| {
                RecordStoreError::Unavailable(format!("negative byte count in {column}"))
            })
        };

        Ok(IngestionRecord {
            id: RecordId::from_uuid(row.try_get::<Uuid, _>("id")?),
            owner: OwnerId::from_uuid(row.try_get::<Uuid, _>("owner_id")?),
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            primary: AssetRef {
                url: row.try_get("video_url")?,
                store_id: StoreId::new(row.try_get::<String, _>("video_store_id")?),
                bytes: bytes("video_bytes")?,
                duration_secs: None,
            },
            secondary: AssetRef {
                url: row.try_get("thumbnail_url")?,
                store_id: StoreId::new(row.try_get::<String, _>("thumbnail_store_id")?),
                bytes: bytes("thumbnail_bytes")?,
                duration_secs: None,
            },
            duration_secs: row.try_get("duration_secs")?,
            is_published: row.try_get("is_published")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }
}

fn byte_count(asset: &AssetRef) -> Result<i64> {
    i64::try_from(asset.bytes)
        .map_err(|_| RecordStoreError::ValidationRejected("byte count out of range".to_string()))
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    #[tracing::instrument(skip(self, fields), fields(owner = %fields.owner))]
    async fn create(&self, fields: NewIngestionRecord) -> Result<IngestionRecord> {
        let id = RecordId::new();
        let video_bytes = byte_count(&fields.primary)?;
        let thumbnail_bytes = byte_count(&fields.secondary)?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO media_records (
                id, owner_id, title, description,
                video_url, video_store_id, video_bytes,
                thumbnail_url, thumbnail_store_id, thumbnail_bytes,
                duration_secs, is_published
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(fields.owner.as_uuid())
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(&fields.primary.url)
        .bind(fields.primary.store_id.as_str())
        .bind(video_bytes)
        .bind(&fields.secondary.url)
        .bind(fields.secondary.store_id.as_str())
        .bind(thumbnail_bytes)
        .bind(fields.duration_secs)
        .bind(fields.is_published)
        .fetch_one(&self.pool)
        .await?;

        let mut record = Self::row_to_record(row)?;
        record.primary.duration_secs = fields.primary.duration_secs;
        record.secondary.duration_secs = fields.secondary.duration_secs;
        Ok(record)
    }

    async fn get(&self, id: RecordId) -> Result<Option<IngestionRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM media_records WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn is_referenced(&self, store_id: &StoreId) -> Result<bool> {
        let referenced: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM media_records
                WHERE video_store_id = $1 OR thumbnail_store_id = $1
            )
            "#,
        )
        .bind(store_id.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(referenced)
    }
}
