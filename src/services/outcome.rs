//! Typed outcomes returned by the ingestion orchestrator.
//!
//! Nothing past the orchestrator sees a raw gateway or repository error: each
//! is folded into an [`ErrorKind`] plus detail, and partial failures carry
//! enough identifying data (bucket, key, URL, ids) to reconcile by hand.

use crate::services::{object_store::GatewayError, repository::RepositoryError};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRequest,
    StoreUnavailable,
    BucketNotFound,
    UnconfiguredBucket,
    PersistenceDenied,
    PersistenceError,
    NotFound,
}

impl ErrorKind {
    /// Message suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "the upload request is invalid",
            ErrorKind::StoreUnavailable => "file storage is currently unavailable",
            ErrorKind::BucketNotFound | ErrorKind::UnconfiguredBucket => {
                "file storage is misconfigured"
            }
            ErrorKind::PersistenceDenied => "action blocked by access policy",
            ErrorKind::PersistenceError => "the record could not be saved",
            ErrorKind::NotFound => "the requested record does not exist",
        }
    }

    /// Configuration problems an operator has to fix.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ErrorKind::BucketNotFound | ErrorKind::UnconfiguredBucket
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<&GatewayError> for ErrorKind {
    fn from(err: &GatewayError) -> Self {
        match err {
            GatewayError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            GatewayError::BucketNotFound(_) => ErrorKind::BucketNotFound,
            GatewayError::UnconfiguredBucket(_) => ErrorKind::UnconfiguredBucket,
            GatewayError::InvalidObjectKey(_) => ErrorKind::InvalidRequest,
        }
    }
}

impl From<&RepositoryError> for ErrorKind {
    fn from(err: &RepositoryError) -> Self {
        match err {
            RepositoryError::PersistenceDenied(_) => ErrorKind::PersistenceDenied,
            RepositoryError::PersistenceError(_) => ErrorKind::PersistenceError,
            RepositoryError::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// An error kind together with the underlying detail.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub error_kind: ErrorKind,
    pub detail: String,
}

impl Failure {
    pub fn new(error_kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            error_kind,
            detail: detail.into(),
        }
    }

    pub fn invalid(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, detail)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_kind, self.detail)
    }
}

impl From<&GatewayError> for Failure {
    fn from(err: &GatewayError) -> Self {
        Self::new(err.into(), err.to_string())
    }
}

impl From<&RepositoryError> for Failure {
    fn from(err: &RepositoryError) -> Self {
        Self::new(err.into(), err.to_string())
    }
}

/// Where an ingestion stopped.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestState {
    Pending,
    KeyAssigned,
    Stored,
    MetadataPersisted,
    FeaturePersisted,
    /// Validation failed; nothing was written.
    Rejected,
    StoreFailed,
    /// The object exists with no metadata.
    MetadataFailed,
    /// Object and metadata exist with no carousel entry.
    FeatureFailed,
}

/// Data left behind by a failed ingestion. Reported, never cleaned up automatically.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Orphan {
    /// Object stored but no metadata row references it.
    #[serde(rename_all = "camelCase")]
    Object { bucket: String, key: String },
    /// Metadata row present but the required carousel entry is missing.
    #[serde(rename_all = "camelCase")]
    Metadata {
        url: String,
        metadata_id: Uuid,
        bucket: String,
        key: String,
    },
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IngestReceipt {
    pub url: String,
    pub metadata_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_id: Option<Uuid>,
    pub bucket: String,
    pub key: String,
    pub state: IngestState,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IngestFailure {
    pub state: IngestState,
    pub error_kind: ErrorKind,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphan: Option<Orphan>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum IngestResult {
    Completed(IngestReceipt),
    Failed(IngestFailure),
}

impl IngestResult {
    pub fn state(&self) -> IngestState {
        match self {
            IngestResult::Completed(receipt) => receipt.state,
            IngestResult::Failed(failure) => failure.state,
        }
    }

    #[cfg(test)]
    pub fn receipt(&self) -> Option<&IngestReceipt> {
        match self {
            IngestResult::Completed(receipt) => Some(receipt),
            IngestResult::Failed(_) => None,
        }
    }

    #[cfg(test)]
    pub fn failure(&self) -> Option<&IngestFailure> {
        match self {
            IngestResult::Completed(_) => None,
            IngestResult::Failed(failure) => Some(failure),
        }
    }
}

/// Result of one retraction step.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum StepOutcome {
    Deleted,
    /// Nothing to delete; the target was already gone.
    Absent,
    /// Not attempted because the image URL is not managed by this service.
    Skipped,
    Failed(Failure),
}

impl StepOutcome {
    pub fn deleted(&self) -> bool {
        matches!(self, StepOutcome::Deleted)
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            StepOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RetractStep {
    Object,
    Metadata,
    Feature,
}

/// Aggregate of a best-effort retraction: one outcome per store.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RetractReport {
    pub feature_id: Uuid,
    pub image_url: String,
    /// Whether the image URL belongs to a bucket this service manages.
    pub managed: bool,
    pub object: StepOutcome,
    pub metadata: StepOutcome,
    pub feature: StepOutcome,
}

impl RetractReport {
    pub fn steps(&self) -> [(RetractStep, &StepOutcome); 3] {
        [
            (RetractStep::Object, &self.object),
            (RetractStep::Metadata, &self.metadata),
            (RetractStep::Feature, &self.feature),
        ]
    }

    pub fn failures(&self) -> Vec<(RetractStep, &Failure)> {
        self.steps()
            .into_iter()
            .filter_map(|(step, outcome)| outcome.failure().map(|f| (step, f)))
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.failures().is_empty()
    }
}

pub type RetractResult = Result<RetractReport, Failure>;

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedObject {
    pub bucket: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedMetadata {
    pub metadata_id: Uuid,
    pub url: String,
    pub category: String,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DanglingFeature {
    pub feature_id: Uuid,
    pub image_url: String,
}

/// Read-only consistency scan across the three stores.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub orphaned_objects: Vec<OrphanedObject>,
    pub orphaned_metadata: Vec<OrphanedMetadata>,
    pub dangling_features: Vec<DanglingFeature>,
    /// Stores that could not be scanned.
    pub errors: Vec<Failure>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.orphaned_objects.is_empty()
            && self.orphaned_metadata.is_empty()
            && self.dangling_features.is_empty()
            && self.errors.is_empty()
    }
}
