//! HTTP handlers for the ingestion pipeline.
//!
//! Orchestrator outcomes are typed values, so these handlers only pick a
//! status code and serialize; they never interpret partial failures.

use crate::{
    errors::{AppError, status_for},
    models::upload::UploadRequest,
    services::outcome::{Failure, IngestFailure, IngestResult, RetractReport, RetractStep},
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestErrorBody<'a> {
    #[serde(flatten)]
    failure: &'a IngestFailure,
    message: &'static str,
}

/// `POST /ingest` — multipart upload.
///
/// Expects a `category` text field and a `file` field; any other text field
/// becomes an attribute of the upload.
pub async fn ingest(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut category = None;
    let mut file: Option<(String, String, Bytes)> = None;
    let mut attributes = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                file = Some((filename, content_type, bytes));
            }
            "category" => category = Some(field.text().await?),
            "" => continue,
            _ => {
                let value = field.text().await?;
                attributes.push((name, value));
            }
        }
    }

    let category = category.ok_or_else(|| AppError::bad_request("missing `category` field"))?;
    let (filename, content_type, payload) =
        file.ok_or_else(|| AppError::bad_request("missing `file` field"))?;

    let request = attributes
        .into_iter()
        .fold(UploadRequest::new(category, filename, content_type, payload), |req, (k, v)| {
            req.with_attribute(k, v)
        });

    let result = state.ingestion.ingest(request).await;
    tracing::info!(state = ?result.state(), "ingest request finished");

    let response = match result {
        IngestResult::Completed(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        IngestResult::Failed(failure) => {
            let body = IngestErrorBody {
                failure: &failure,
                message: failure.error_kind.user_message(),
            };
            (status_for(failure.error_kind), Json(body)).into_response()
        }
    };
    Ok(response)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StepError<'a> {
    step: RetractStep,
    #[serde(flatten)]
    failure: &'a Failure,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RetractBody<'a> {
    object_deleted: bool,
    metadata_deleted: bool,
    feature_deleted: bool,
    #[serde(flatten)]
    report: &'a RetractReport,
    errors: Vec<StepError<'a>>,
}

/// `POST /retract/{feature_id}` — best-effort removal of a carousel entry,
/// its image and its metadata.
///
/// 200 when every step succeeded or had nothing to do, 207 when some step
/// failed; the body lists each step either way.
pub async fn retract(
    State(state): State<AppState>,
    Path(feature_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let report = state.ingestion.retract(feature_id).await?;

    let body = RetractBody {
        object_deleted: report.object.deleted(),
        metadata_deleted: report.metadata.deleted(),
        feature_deleted: report.feature.deleted(),
        errors: report
            .failures()
            .into_iter()
            .map(|(step, failure)| StepError { step, failure })
            .collect(),
        report: &report,
    };
    let status = if report.is_clean() {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(body)).into_response())
}

/// `GET /admin/orphans` — read-only consistency report.
pub async fn orphans(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.ingestion.reconcile().await)
}
