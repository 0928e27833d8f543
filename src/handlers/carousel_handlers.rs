//! Carousel admin endpoints. Deletion goes through `POST /retract/{id}` so
//! the image and its metadata are removed with the entry.

use crate::{
    errors::AppError,
    models::carousel::{CarouselImage, CarouselOrder, CarouselUpdate, NewCarouselImage},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListCarouselQuery {
    pub order: Option<String>,
    #[serde(default)]
    pub active_only: bool,
}

/// `GET /carousel?order=sort_order|created_at&active_only=true`
pub async fn list_carousel(
    State(state): State<AppState>,
    Query(q): Query<ListCarouselQuery>,
) -> Result<Json<Vec<CarouselImage>>, AppError> {
    let order = match q.order.as_deref() {
        None => CarouselOrder::default(),
        Some(raw) => raw.parse().map_err(AppError::bad_request)?,
    };
    let mut entries = state.ingestion.features().list(order).await?;
    if q.active_only {
        entries.retain(|e| e.active);
    }
    Ok(Json(entries))
}

/// `POST /carousel` — add an entry pointing at an already hosted image.
pub async fn create_carousel(
    State(state): State<AppState>,
    Json(payload): Json<NewCarouselImage>,
) -> Result<impl IntoResponse, AppError> {
    let url = payload.image_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(AppError::bad_request("image_url must be an http(s) URL"));
    }
    let id = state.ingestion.features().create(payload).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// `PATCH /carousel/{id}` — update alt text, position or visibility.
pub async fn update_carousel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<CarouselUpdate>,
) -> Result<Json<CarouselImage>, AppError> {
    let updated = state.ingestion.features().update(id, update).await?;
    Ok(Json(updated))
}
