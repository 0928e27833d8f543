//! In-memory fakes of the gateway and repositories, with call counters and
//! failure injection.

use crate::{
    models::{
        carousel::{CarouselImage, CarouselOrder, CarouselUpdate, NewCarouselImage},
        image::{ImageMetadataRecord, NewImageMetadata},
        object::ObjectLocation,
        upload::Attributes,
    },
    services::{
        bucket_registry::{BucketConfig, BucketRegistry},
        carousel_repository::FeatureRepository,
        metadata_repository::MetadataRepository,
        object_store::{GatewayError, GatewayResult, ObjectStoreGateway, registry_public_url},
        repository::{RepositoryError, RepositoryResult},
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::{
    collections::BTreeMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailMode {
    /// Authorization style rejection.
    Denied,
    /// Anything else.
    Error,
}

impl FailMode {
    fn repository_error(self) -> RepositoryError {
        match self {
            FailMode::Denied => RepositoryError::PersistenceDenied("injected denial".into()),
            FailMode::Error => RepositoryError::PersistenceError("injected failure".into()),
        }
    }

    fn gateway_error(self) -> GatewayError {
        GatewayError::StoreUnavailable(format!("injected {:?}", self))
    }
}

#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    registry: BucketRegistry,
    objects: Mutex<BTreeMap<(String, String), Bytes>>,
    fail_put: Mutex<Option<FailMode>>,
    fail_delete: Mutex<Option<FailMode>>,
    pub put_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn with_buckets(buckets: &[(&str, Option<&str>)]) -> Self {
        let registry = BucketRegistry::new(buckets.iter().map(|(id, url)| BucketConfig {
            id: id.to_string(),
            public_base_url: url.map(str::to_string),
        }))
        .expect("valid test buckets");
        Self {
            registry,
            ..Default::default()
        }
    }

    pub fn fail_put(&self, mode: FailMode) {
        *self.fail_put.lock().unwrap() = Some(mode);
    }

    pub fn fail_delete(&self, mode: FailMode) {
        *self.fail_delete.lock().unwrap() = Some(mode);
    }

    pub fn keys(&self) -> Vec<(String, String)> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStoreGateway for MemoryObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        _content_type: &str,
        _attributes: &Attributes,
    ) -> GatewayResult<ObjectLocation> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if !self.registry.contains(bucket) {
            return Err(GatewayError::BucketNotFound(bucket.to_string()));
        }
        let url = self.public_url(bucket, key)?;
        if let Some(mode) = *self.fail_put.lock().unwrap() {
            return Err(mode.gateway_error());
        }
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(ObjectLocation {
            bucket: bucket.to_string(),
            key: key.to_string(),
            url,
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> GatewayResult<bool> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(mode) = *self.fail_delete.lock().unwrap() {
            return Err(mode.gateway_error());
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()))
            .is_some())
    }

    async fn list(&self, bucket: &str) -> GatewayResult<Vec<String>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect())
    }

    fn public_url(&self, bucket: &str, key: &str) -> GatewayResult<String> {
        registry_public_url(&self.registry, bucket, key)
    }

    fn locate(&self, url: &str) -> Option<(String, String)> {
        self.registry.locate(url)
    }

    fn buckets(&self) -> Vec<String> {
        self.registry.ids().map(str::to_string).collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryMetadataRepository {
    records: Mutex<Vec<ImageMetadataRecord>>,
    fail_create: Mutex<Option<FailMode>>,
    pub create_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl MemoryMetadataRepository {
    pub fn fail_create(&self, mode: FailMode) {
        *self.fail_create.lock().unwrap() = Some(mode);
    }

    pub fn clear_failures(&self) {
        *self.fail_create.lock().unwrap() = None;
    }

    pub fn records(&self) -> Vec<ImageMetadataRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataRepository for MemoryMetadataRepository {
    async fn create(&self, record: NewImageMetadata) -> RepositoryResult<Uuid> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(mode) = *self.fail_create.lock().unwrap() {
            return Err(mode.repository_error());
        }
        let id = Uuid::new_v4();
        self.records.lock().unwrap().push(record.into_record(id));
        Ok(id)
    }

    async fn delete_by_url(&self, url: &str) -> RepositoryResult<bool> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.url != url);
        Ok(records.len() != before)
    }

    async fn list(&self) -> RepositoryResult<Vec<ImageMetadataRecord>> {
        Ok(self.records())
    }
}

#[derive(Debug, Default)]
pub struct MemoryFeatureRepository {
    entries: Mutex<Vec<CarouselImage>>,
    fail_create: Mutex<Option<FailMode>>,
    pub create_calls: AtomicUsize,
}

impl MemoryFeatureRepository {
    pub fn fail_create(&self, mode: FailMode) {
        *self.fail_create.lock().unwrap() = Some(mode);
    }

    pub fn clear_failures(&self) {
        *self.fail_create.lock().unwrap() = None;
    }

    pub fn entries(&self) -> Vec<CarouselImage> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeatureRepository for MemoryFeatureRepository {
    async fn create(&self, entry: NewCarouselImage) -> RepositoryResult<Uuid> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(mode) = *self.fail_create.lock().unwrap() {
            return Err(mode.repository_error());
        }
        let id = Uuid::new_v4();
        self.entries
            .lock()
            .unwrap()
            .push(entry.into_record(id, Utc::now()));
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Option<CarouselImage>> {
        Ok(self.entries().into_iter().find(|e| e.id == id))
    }

    async fn update(&self, id: Uuid, update: CarouselUpdate) -> RepositoryResult<CarouselImage> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        update.apply(entry);
        Ok(entry.clone())
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        Ok(entries.len() != before)
    }

    async fn list(&self, order: CarouselOrder) -> RepositoryResult<Vec<CarouselImage>> {
        let mut entries = self.entries();
        match order {
            CarouselOrder::SortOrder => entries.sort_by_key(|e| (e.sort_order, e.created_at)),
            CarouselOrder::CreatedAt => entries.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
        Ok(entries)
    }
}
