//! Image metadata persistence.

use crate::{
    models::image::{ImageMetadataRecord, NewImageMetadata},
    services::repository::{AccessLevel, RepositoryError, RepositoryResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

/// Store of [`ImageMetadataRecord`]s.
///
/// Deletion goes by URL because a carousel entry only knows its image by URL.
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    async fn create(&self, record: NewImageMetadata) -> RepositoryResult<Uuid>;

    /// `Ok(false)` when no record carried that URL.
    async fn delete_by_url(&self, url: &str) -> RepositoryResult<bool>;

    async fn list(&self) -> RepositoryResult<Vec<ImageMetadataRecord>>;
}

#[derive(Clone, Debug)]
pub struct SqliteMetadataRepository {
    db: Arc<SqlitePool>,
    access: AccessLevel,
}

impl SqliteMetadataRepository {
    pub fn new(db: Arc<SqlitePool>, access: AccessLevel) -> Self {
        Self { db, access }
    }
}

#[derive(FromRow)]
struct MetadataRow {
    id: String,
    url: String,
    original_filename: String,
    size_bytes: i64,
    content_type: String,
    bucket_id: String,
    storage_key: String,
    category: String,
    attributes: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MetadataRow> for ImageMetadataRecord {
    type Error = RepositoryError;

    fn try_from(row: MetadataRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id).map_err(|err| {
            RepositoryError::PersistenceError(format!("bad metadata id `{}`: {}", row.id, err))
        })?;
        let attributes = serde_json::from_str(&row.attributes).map_err(|err| {
            RepositoryError::PersistenceError(format!("bad attributes for `{}`: {}", row.id, err))
        })?;
        Ok(ImageMetadataRecord {
            id,
            url: row.url,
            original_filename: row.original_filename,
            size_bytes: row.size_bytes,
            content_type: row.content_type,
            bucket_id: row.bucket_id,
            storage_key: row.storage_key,
            category: row.category,
            attributes,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl MetadataRepository for SqliteMetadataRepository {
    async fn create(&self, record: NewImageMetadata) -> RepositoryResult<Uuid> {
        self.access.ensure_writable("creating image metadata")?;
        let id = Uuid::new_v4();
        let attributes = serde_json::to_string(&record.attributes)
            .map_err(|err| RepositoryError::PersistenceError(err.to_string()))?;

        sqlx::query(
            "INSERT INTO image_metadata (
                id, url, original_filename, size_bytes, content_type,
                bucket_id, storage_key, category, attributes, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&record.url)
        .bind(&record.original_filename)
        .bind(record.size_bytes)
        .bind(&record.content_type)
        .bind(&record.bucket_id)
        .bind(&record.storage_key)
        .bind(&record.category)
        .bind(attributes)
        .bind(record.created_at)
        .execute(&*self.db)
        .await?;

        Ok(id)
    }

    async fn delete_by_url(&self, url: &str) -> RepositoryResult<bool> {
        self.access.ensure_writable("deleting image metadata")?;
        let result = sqlx::query("DELETE FROM image_metadata WHERE url = ?")
            .bind(url)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> RepositoryResult<Vec<ImageMetadataRecord>> {
        let rows = sqlx::query_as::<_, MetadataRow>(
            "SELECT id, url, original_filename, size_bytes, content_type,
                    bucket_id, storage_key, category, attributes, created_at
             FROM image_metadata
             ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&*self.db)
        .await?;

        rows.into_iter().map(ImageMetadataRecord::try_from).collect()
    }
}
