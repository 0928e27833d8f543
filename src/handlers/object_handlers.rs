//! Serves stored objects at their public URL.
//! Streams object bodies to avoid buffering in memory.

use crate::{
    errors::AppError,
    services::object_store::{GatewayError, ObjectAttributes},
    state::AppState,
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use tokio_util::io::ReaderStream;

/// `GET /public/{bucket}/{*key}` — stream an object as stored.
pub async fn get_public_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let (meta, file) = state
        .objects
        .open(&bucket, &key)
        .await
        .map_err(|err| match err {
            GatewayError::BucketNotFound(_) => {
                AppError::not_found(format!("bucket `{}` not found", bucket))
            }
            other => other.into(),
        })?
        .ok_or_else(|| AppError::not_found(format!("object `{}` not found in `{}`", key, bucket)))?;

    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta);

    Ok(response)
}

fn set_object_headers(headers: &mut HeaderMap, meta: &ObjectAttributes) {
    let content_type = if meta.content_type.is_empty() {
        "application/octet-stream"
    } else {
        meta.content_type.as_str()
    };
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size_bytes));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );
}
