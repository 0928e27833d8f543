//! Carousel entries: the feature records that reference uploaded images.
//!
//! Stored in their own table with no foreign key to `image_metadata`;
//! consistency between the two is the orchestrator's job.

use crate::{
    models::carousel::{CarouselImage, CarouselOrder, CarouselUpdate, NewCarouselImage},
    services::repository::{AccessLevel, RepositoryError, RepositoryResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait FeatureRepository: Send + Sync {
    async fn create(&self, entry: NewCarouselImage) -> RepositoryResult<Uuid>;

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<CarouselImage>>;

    /// Apply a partial update. `NotFound` if the id does not exist.
    async fn update(&self, id: Uuid, update: CarouselUpdate) -> RepositoryResult<CarouselImage>;

    /// `Ok(false)` when the id did not exist.
    async fn delete(&self, id: Uuid) -> RepositoryResult<bool>;

    /// Fresh ordered snapshot; no cursor state is kept between calls.
    async fn list(&self, order: CarouselOrder) -> RepositoryResult<Vec<CarouselImage>>;
}

#[derive(Clone, Debug)]
pub struct SqliteCarouselRepository {
    db: Arc<SqlitePool>,
    access: AccessLevel,
}

impl SqliteCarouselRepository {
    pub fn new(db: Arc<SqlitePool>, access: AccessLevel) -> Self {
        Self { db, access }
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, image_url, alt_text, sort_order, active, created_at FROM carousel_images";

#[derive(FromRow)]
struct CarouselRow {
    id: String,
    image_url: String,
    alt_text: String,
    sort_order: i64,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<CarouselRow> for CarouselImage {
    type Error = RepositoryError;

    fn try_from(row: CarouselRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id).map_err(|err| {
            RepositoryError::PersistenceError(format!("bad carousel id `{}`: {}", row.id, err))
        })?;
        Ok(CarouselImage {
            id,
            image_url: row.image_url,
            alt_text: row.alt_text,
            sort_order: row.sort_order,
            active: row.active,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl FeatureRepository for SqliteCarouselRepository {
    async fn create(&self, entry: NewCarouselImage) -> RepositoryResult<Uuid> {
        self.access.ensure_writable("creating a carousel entry")?;
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO carousel_images (id, image_url, alt_text, sort_order, active, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&entry.image_url)
        .bind(&entry.alt_text)
        .bind(entry.sort_order)
        .bind(entry.active)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<CarouselImage>> {
        let row = sqlx::query_as::<_, CarouselRow>(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&*self.db)
            .await?;
        row.map(CarouselImage::try_from).transpose()
    }

    async fn update(&self, id: Uuid, update: CarouselUpdate) -> RepositoryResult<CarouselImage> {
        self.access.ensure_writable("updating a carousel entry")?;
        let mut current = self
            .get(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        if update.is_empty() {
            return Ok(current);
        }
        update.apply(&mut current);

        let result = sqlx::query(
            "UPDATE carousel_images SET alt_text = ?, sort_order = ?, active = ? WHERE id = ?",
        )
        .bind(&current.alt_text)
        .bind(current.sort_order)
        .bind(current.active)
        .bind(id.to_string())
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(current)
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        self.access.ensure_writable("deleting a carousel entry")?;
        let result = sqlx::query("DELETE FROM carousel_images WHERE id = ?")
            .bind(id.to_string())
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, order: CarouselOrder) -> RepositoryResult<Vec<CarouselImage>> {
        let order_by = match order {
            CarouselOrder::SortOrder => "sort_order ASC, created_at ASC, id ASC",
            CarouselOrder::CreatedAt => "created_at DESC, id DESC",
        };
        let rows = sqlx::query_as::<_, CarouselRow>(&format!(
            "{} ORDER BY {}",
            SELECT_COLUMNS, order_by
        ))
        .fetch_all(&*self.db)
        .await?;
        rows.into_iter().map(CarouselImage::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn entry(url: &str, sort_order: i64) -> NewCarouselImage {
        NewCarouselImage {
            image_url: url.to_string(),
            alt_text: format!("slide {}", sort_order),
            sort_order,
            active: true,
        }
    }

    #[tokio::test]
    async fn lists_in_display_order() {
        let pool = db::memory_pool().await.unwrap();
        let repo = SqliteCarouselRepository::new(pool, AccessLevel::Service);

        repo.create(entry("http://x.test/c.png", 3)).await.unwrap();
        repo.create(entry("http://x.test/a.png", 1)).await.unwrap();
        repo.create(entry("http://x.test/b.png", 2)).await.unwrap();

        let urls: Vec<_> = repo
            .list(CarouselOrder::SortOrder)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.image_url)
            .collect();
        assert_eq!(
            urls,
            ["http://x.test/a.png", "http://x.test/b.png", "http://x.test/c.png"]
        );

        // Each call is a fresh query.
        assert_eq!(repo.list(CarouselOrder::SortOrder).await.unwrap().len(), 3);
        assert_eq!(repo.list(CarouselOrder::CreatedAt).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn update_and_delete_by_id() {
        let pool = db::memory_pool().await.unwrap();
        let repo = SqliteCarouselRepository::new(pool, AccessLevel::Service);
        let id = repo.create(entry("http://x.test/a.png", 0)).await.unwrap();

        let updated = repo
            .update(
                id,
                CarouselUpdate {
                    active: Some(false),
                    sort_order: Some(7),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.active);
        assert_eq!(updated.sort_order, 7);
        assert_eq!(updated.alt_text, "slide 0");
        assert_eq!(repo.get(id).await.unwrap(), Some(updated));

        assert!(repo.delete(id).await.unwrap());
        assert!(!repo.delete(id).await.unwrap());
        assert!(repo.get(id).await.unwrap().is_none());
        assert!(matches!(
            repo.update(id, CarouselUpdate::default()).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn public_access_is_read_only() {
        let pool = db::memory_pool().await.unwrap();
        let repo = SqliteCarouselRepository::new(pool, AccessLevel::Public);
        assert!(matches!(
            repo.create(entry("http://x.test/a.png", 0)).await,
            Err(RepositoryError::PersistenceDenied(_))
        ));
        assert!(repo.list(CarouselOrder::SortOrder).await.unwrap().is_empty());
    }
}
