use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::object_store::{encode_path, ObjectStoreError};
use crate::AppState;

/// Serve blob content of the local backend.
/// Route: GET /blobs/*path
pub async fn serve_blob(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let url = format!(
        "{}/{}",
        state.config.storage.blob_base_url.trim_end_matches('/'),
        encode_path(&path)
    );

    let data = state
        .object_store
        .get_by_url(&url)
        .await
        .map_err(|e| match e {
            ObjectStoreError::NotFound(_) | ObjectStoreError::ForeignUrl(_) => {
                ApiError::not_found("Blob not found")
            }
            _ => ApiError::internal(format!("Failed to retrieve blob: {e}")),
        })?;

    let mime_type = mime_guess::from_path(&path).first_or_octet_stream();
    let byte_size = data.len() as u64;

    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        mime_type
            .essence_str()
            .parse()
            .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(header::CONTENT_LENGTH, header::HeaderValue::from(byte_size));

    let filename = path.rsplit('/').next().unwrap_or(&path);
    if let Ok(value) = format!("inline; filename=\"{filename}\"").parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    // Blob paths carry a unique stamp, so content never changes under a URL
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    Ok(response)
}
