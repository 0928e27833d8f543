//! Defines routes for the ingestion service.
//!
//! ## Structure
//! - **Pipeline**
//!   - `POST  /ingest` — multipart upload (category, file, attributes)
//!   - `POST  /retract/{feature_id}` — remove a carousel entry with its image and metadata
//!   - `GET   /admin/orphans` — reconciliation report
//!
//! - **Carousel admin**
//!   - `GET   /carousel` — list entries (`?order=sort_order|created_at&active_only=true`)
//!   - `POST  /carousel` — add an entry for an externally hosted image
//!   - `PATCH /carousel/{id}` — update alt text, position, visibility
//!
//! - **Public objects**
//!   - `GET   /public/{bucket}/{*key}` — the target of generated public URLs
//!
//! The wildcard `*key` allows nested keys like `covers/1700000000000_ab12cd_banner.jpg`.

use crate::{
    handlers::{
        carousel_handlers::{create_carousel, list_carousel, update_carousel},
        health_handlers::{healthz, readyz},
        ingest_handlers::{ingest, orphans, retract},
        object_handlers::get_public_object,
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};

/// Build and return the router for every endpoint.
///
/// Request bodies are capped at `max_upload_bytes`; uploads above it are
/// rejected before reaching the orchestrator.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Pipeline
        .route("/ingest", post(ingest))
        .route("/retract/{feature_id}", post(retract))
        .route("/admin/orphans", get(orphans))
        // Carousel admin
        .route("/carousel", get(list_carousel).post(create_carousel))
        .route("/carousel/{id}", patch(update_carousel))
        // Public objects
        .route("/public/{bucket}/{*key}", get(get_public_object))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
