//! src/services/ingestion_service.rs
//!
//! IngestionService sequences an upload across the object store, the image
//! metadata table and the carousel table. No transaction spans them. Each
//! step waits for the previous one and a failure stops the pipeline where it
//! happens. Whatever was already written is reported back as an orphan and
//! left in place.
//!
//! Retraction walks the same stores in reverse order of importance and keeps
//! going past individual failures. The carousel entry is deleted last.

use crate::{
    models::{
        carousel::{CarouselOrder, NewCarouselImage},
        image::NewImageMetadata,
        object::ObjectLocation,
        upload::{Attributes, Category, UploadRequest},
    },
    services::{
        carousel_repository::FeatureRepository,
        key_generator::KeyGenerator,
        metadata_repository::MetadataRepository,
        object_store::ObjectStoreGateway,
        outcome::{
            DanglingFeature, ErrorKind, Failure, IngestFailure, IngestReceipt, IngestResult,
            IngestState, Orphan, OrphanedMetadata, OrphanedObject, ReconciliationReport,
            RetractReport, RetractResult, StepOutcome,
        },
    },
};
use chrono::Utc;
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Display attributes a carousel upload carries in its attribute map.
#[derive(Debug, Clone, PartialEq)]
struct CarouselDisplay {
    alt_text: String,
    sort_order: i64,
    active: bool,
}

impl CarouselDisplay {
    fn from_attributes(attributes: &Attributes, original_filename: &str) -> Result<Self, Failure> {
        let alt_text = attributes
            .get("alt")
            .cloned()
            .unwrap_or_else(|| original_filename.to_string());
        let sort_order = match attributes.get("sort_order") {
            None => 0,
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                Failure::invalid(format!("sort_order `{}` is not an integer", raw))
            })?,
        };
        let active = match attributes.get("active").map(|v| v.trim()) {
            None => true,
            Some("true") => true,
            Some("false") => false,
            Some(other) => {
                return Err(Failure::invalid(format!(
                    "active `{}` must be `true` or `false`",
                    other
                )));
            }
        };
        Ok(Self {
            alt_text,
            sort_order,
            active,
        })
    }
}

/// A request that passed validation.
struct ValidatedUpload {
    category: Category,
    display: Option<CarouselDisplay>,
    content_type: String,
}

/// Orchestrates uploads and retractions over injected capabilities.
///
/// Cheap to clone; holds no per-request state, so concurrent calls for
/// different uploads never contend.
#[derive(Clone)]
pub struct IngestionService {
    keys: Arc<dyn KeyGenerator>,
    store: Arc<dyn ObjectStoreGateway>,
    metadata: Arc<dyn MetadataRepository>,
    features: Arc<dyn FeatureRepository>,
}

impl IngestionService {
    pub fn new(
        keys: Arc<dyn KeyGenerator>,
        store: Arc<dyn ObjectStoreGateway>,
        metadata: Arc<dyn MetadataRepository>,
        features: Arc<dyn FeatureRepository>,
    ) -> Self {
        Self {
            keys,
            store,
            metadata,
            features,
        }
    }

    pub fn features(&self) -> &Arc<dyn FeatureRepository> {
        &self.features
    }

    fn validate(&self, request: &UploadRequest) -> Result<ValidatedUpload, Failure> {
        if request.payload.is_empty() {
            return Err(Failure::invalid("payload is empty"));
        }
        let category: Category = request.category.parse().map_err(Failure::invalid)?;
        let display = if category.requires_feature_record() {
            Some(CarouselDisplay::from_attributes(
                &request.attributes,
                &request.original_filename,
            )?)
        } else {
            None
        };
        let content_type = match request.content_type.trim() {
            "" => DEFAULT_CONTENT_TYPE.to_string(),
            declared => declared.to_string(),
        };
        Ok(ValidatedUpload {
            category,
            display,
            content_type,
        })
    }

    /// Upload a file, record its metadata and, for carousel uploads, create
    /// the carousel entry.
    ///
    /// Never rolls back: a failure after the object is stored returns the
    /// orphan that was left behind.
    pub async fn ingest(&self, request: UploadRequest) -> IngestResult {
        let mut state = IngestState::Pending;
        debug!(
            filename = %request.original_filename,
            category = %request.category,
            size = request.payload.len(),
            ?state,
            "ingest requested"
        );

        let upload = match self.validate(&request) {
            Ok(upload) => upload,
            Err(failure) => {
                info!(%failure, "rejected upload");
                return IngestResult::Failed(IngestFailure {
                    state: IngestState::Rejected,
                    error_kind: failure.error_kind,
                    detail: failure.detail,
                    orphan: None,
                });
            }
        };

        let storage_key = self.keys.generate_key(&request.original_filename);
        let bucket = upload.category.bucket();
        let object_key = storage_key.in_folder(upload.category.folder());
        state = advance(state, IngestState::KeyAssigned, &object_key);

        let location = match self
            .store
            .put(
                bucket,
                &object_key,
                request.payload.clone(),
                &upload.content_type,
                &request.attributes,
            )
            .await
        {
            Ok(location) => location,
            Err(err) => {
                let failure = Failure::from(&err);
                if failure.error_kind.is_configuration() {
                    error!(bucket, key = %object_key, %failure, "object store misconfigured");
                } else {
                    warn!(bucket, key = %object_key, %failure, "object store put failed");
                }
                return IngestResult::Failed(IngestFailure {
                    state: IngestState::StoreFailed,
                    error_kind: failure.error_kind,
                    detail: failure.detail,
                    orphan: None,
                });
            }
        };
        state = advance(state, IngestState::Stored, &object_key);

        let metadata_id = match self
            .metadata
            .create(NewImageMetadata {
                url: location.url.clone(),
                original_filename: request.original_filename.clone(),
                size_bytes: request.payload.len() as i64,
                content_type: upload.content_type.clone(),
                bucket_id: location.bucket.clone(),
                storage_key: location.key.clone(),
                category: upload.category.as_str().to_string(),
                attributes: request.attributes.clone(),
                created_at: Utc::now(),
            })
            .await
        {
            Ok(id) => id,
            Err(err) => {
                let failure = Failure::from(&err);
                warn!(
                    bucket = %location.bucket,
                    key = %location.key,
                    %failure,
                    "metadata insert failed; object left orphaned"
                );
                return IngestResult::Failed(IngestFailure {
                    state: IngestState::MetadataFailed,
                    error_kind: failure.error_kind,
                    detail: failure.detail,
                    orphan: Some(Orphan::Object {
                        bucket: location.bucket,
                        key: location.key,
                    }),
                });
            }
        };
        state = advance(state, IngestState::MetadataPersisted, &object_key);

        let Some(display) = upload.display else {
            return completed(location, metadata_id, None, state);
        };

        let feature_id = match self
            .features
            .create(NewCarouselImage {
                image_url: location.url.clone(),
                alt_text: display.alt_text,
                sort_order: display.sort_order,
                active: display.active,
            })
            .await
        {
            Ok(id) => id,
            Err(err) => {
                let failure = Failure::from(&err);
                warn!(
                    url = %location.url,
                    %metadata_id,
                    %failure,
                    "carousel insert failed; metadata left orphaned"
                );
                return IngestResult::Failed(IngestFailure {
                    state: IngestState::FeatureFailed,
                    error_kind: failure.error_kind,
                    detail: failure.detail,
                    orphan: Some(Orphan::Metadata {
                        url: location.url,
                        metadata_id,
                        bucket: location.bucket,
                        key: location.key,
                    }),
                });
            }
        };
        state = advance(state, IngestState::FeaturePersisted, &object_key);

        completed(location, metadata_id, Some(feature_id), state)
    }

    /// Delete a carousel entry together with its image and metadata.
    ///
    /// Best effort: every step is attempted regardless of earlier failures and
    /// the outcome of each is reported.
    pub async fn retract(&self, feature_id: Uuid) -> RetractResult {
        let feature = match self.features.get(feature_id).await {
            Ok(Some(feature)) => feature,
            Ok(None) => {
                return Err(Failure::new(
                    ErrorKind::NotFound,
                    format!("carousel entry `{}` not found", feature_id),
                ));
            }
            Err(err) => return Err(Failure::from(&err)),
        };

        let managed = self.store.locate(&feature.image_url);
        let (object, metadata) = match &managed {
            None => {
                debug!(url = %feature.image_url, "unmanaged image URL; skipping object and metadata");
                (StepOutcome::Skipped, StepOutcome::Skipped)
            }
            Some((bucket, key)) => {
                let object = match self.store.delete(bucket, key).await {
                    Ok(true) => StepOutcome::Deleted,
                    Ok(false) => StepOutcome::Absent,
                    Err(err) => {
                        warn!(%bucket, %key, error = %err, "object delete failed during retract");
                        StepOutcome::Failed(Failure::from(&err))
                    }
                };
                let metadata = match self.metadata.delete_by_url(&feature.image_url).await {
                    Ok(true) => StepOutcome::Deleted,
                    Ok(false) => StepOutcome::Absent,
                    Err(err) => {
                        warn!(url = %feature.image_url, error = %err, "metadata delete failed during retract");
                        StepOutcome::Failed(Failure::from(&err))
                    }
                };
                (object, metadata)
            }
        };

        let feature_outcome = match self.features.delete(feature_id).await {
            Ok(true) => StepOutcome::Deleted,
            Ok(false) => StepOutcome::Absent,
            Err(err) => {
                warn!(%feature_id, error = %err, "carousel delete failed during retract");
                StepOutcome::Failed(Failure::from(&err))
            }
        };

        let report = RetractReport {
            feature_id,
            image_url: feature.image_url,
            managed: managed.is_some(),
            object,
            metadata,
            feature: feature_outcome,
        };
        info!(
            %feature_id,
            failures = report.failures().len(),
            "retract finished"
        );
        Ok(report)
    }

    /// Scan all three stores and report inconsistencies. Deletes nothing.
    pub async fn reconcile(&self) -> ReconciliationReport {
        let mut report = ReconciliationReport::default();

        let metadata = match self.metadata.list().await {
            Ok(records) => records,
            Err(err) => {
                report.errors.push(Failure::from(&err));
                return report;
            }
        };
        let features = match self.features.list(CarouselOrder::CreatedAt).await {
            Ok(entries) => entries,
            Err(err) => {
                report.errors.push(Failure::from(&err));
                return report;
            }
        };

        let stored: HashSet<(&str, &str)> = metadata
            .iter()
            .map(|m| (m.bucket_id.as_str(), m.storage_key.as_str()))
            .collect();
        for bucket in self.store.buckets() {
            match self.store.list(&bucket).await {
                Ok(keys) => {
                    for key in keys {
                        if !stored.contains(&(bucket.as_str(), key.as_str())) {
                            report.orphaned_objects.push(OrphanedObject {
                                url: self.store.public_url(&bucket, &key).ok(),
                                bucket: bucket.clone(),
                                key,
                            });
                        }
                    }
                }
                Err(err) => report.errors.push(Failure::from(&err)),
            }
        }

        let featured: HashSet<&str> = features.iter().map(|f| f.image_url.as_str()).collect();
        for record in &metadata {
            let needs_feature = record
                .category
                .parse::<Category>()
                .map(|c| c.requires_feature_record())
                .unwrap_or(false);
            if needs_feature && !featured.contains(record.url.as_str()) {
                report.orphaned_metadata.push(OrphanedMetadata {
                    metadata_id: record.id,
                    url: record.url.clone(),
                    category: record.category.clone(),
                });
            }
        }

        let described: HashSet<&str> = metadata.iter().map(|m| m.url.as_str()).collect();
        for feature in &features {
            if self.store.locate(&feature.image_url).is_some()
                && !described.contains(feature.image_url.as_str())
            {
                report.dangling_features.push(DanglingFeature {
                    feature_id: feature.id,
                    image_url: feature.image_url.clone(),
                });
            }
        }

        if !report.is_consistent() {
            warn!(
                orphaned_objects = report.orphaned_objects.len(),
                orphaned_metadata = report.orphaned_metadata.len(),
                dangling_features = report.dangling_features.len(),
                errors = report.errors.len(),
                "reconciliation found inconsistencies"
            );
        }
        report
    }
}

fn advance(from: IngestState, to: IngestState, key: &str) -> IngestState {
    debug!(?from, ?to, key, "ingest transition");
    to
}

fn completed(
    location: ObjectLocation,
    metadata_id: Uuid,
    feature_id: Option<Uuid>,
    state: IngestState,
) -> IngestResult {
    info!(url = %location.url, %metadata_id, ?feature_id, "ingest completed");
    IngestResult::Completed(IngestReceipt {
        url: location.url,
        metadata_id,
        feature_id,
        bucket: location.bucket,
        key: location.key,
        state,
    })
}
