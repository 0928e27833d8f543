//! Metadata persisted for every successfully stored image.

use super::upload::Attributes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row of the `image_metadata` table.
///
/// One-to-one with a successful upload. Deleted by URL when the carousel entry
/// that references it is retracted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ImageMetadataRecord {
    pub id: Uuid,

    /// Public URL of the stored object; the lookup key for deletion.
    pub url: String,

    pub original_filename: String,

    pub size_bytes: i64,

    pub content_type: String,

    /// Bucket identifier the object was written to.
    pub bucket_id: String,

    /// Full object key inside the bucket, kept for later deletion.
    pub storage_key: String,

    pub category: String,

    pub attributes: Attributes,

    pub created_at: DateTime<Utc>,
}

/// Everything needed to create an [`ImageMetadataRecord`]; the repository assigns the id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewImageMetadata {
    pub url: String,
    pub original_filename: String,
    pub size_bytes: i64,
    pub content_type: String,
    pub bucket_id: String,
    pub storage_key: String,
    pub category: String,
    pub attributes: Attributes,
    pub created_at: DateTime<Utc>,
}

impl NewImageMetadata {
    #[cfg(test)]
    pub fn into_record(self, id: Uuid) -> ImageMetadataRecord {
        ImageMetadataRecord {
            id,
            url: self.url,
            original_filename: self.original_filename,
            size_bytes: self.size_bytes,
            content_type: self.content_type,
            bucket_id: self.bucket_id,
            storage_key: self.storage_key,
            category: self.category,
            attributes: self.attributes,
            created_at: self.created_at,
        }
    }
}
