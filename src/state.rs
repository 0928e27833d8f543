//! Shared state handed to every handler.

use crate::services::{ingestion_service::IngestionService, object_store::LocalObjectStore};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Orchestrator for uploads, retractions and reconciliation.
    pub ingestion: IngestionService,

    /// Concrete disk store, used directly to serve public objects.
    pub objects: Arc<LocalObjectStore>,

    /// Shared SQLite pool, used by the readiness probe.
    pub db: Arc<SqlitePool>,
}
