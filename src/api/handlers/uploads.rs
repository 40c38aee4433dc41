use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use crate::api::response::{ApiError, JSend, Owner};
use crate::upload::{UploadFile, UploadReport, UploadTarget};
use crate::AppState;

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(format!("Upload request is too large: {}", e.body_text()))
    } else {
        ApiError::bad_request(format!("Invalid multipart data: {}", e.body_text()))
    }
}

/// Upload one or more `file` parts into the album named by `album_id`, or
/// into a new album built from `name` and `description`.
pub async fn create_upload(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    mut multipart: Multipart,
) -> Result<Json<JSend<UploadReport>>, ApiError> {
    let mut files: Vec<UploadFile> = Vec::new();
    let mut album_id: Option<String> = None;
    let mut name: Option<String> = None;
    let mut description: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" | "files" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field.content_type().unwrap_or("").to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                files.push(UploadFile {
                    bytes,
                    file_name,
                    mime_type,
                });
            }
            "album_id" => {
                album_id = Some(field.text().await.map_err(multipart_error)?);
            }
            "name" => {
                name = Some(field.text().await.map_err(multipart_error)?);
            }
            "description" => {
                description = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let target = match (album_id.filter(|id| !id.trim().is_empty()), name) {
        (Some(album_id), _) => UploadTarget::Existing { album_id },
        (None, Some(name)) => UploadTarget::NewAlbum { name, description },
        (None, None) => {
            return Err(ApiError::bad_request(
                "either album_id or name must be provided",
            ))
        }
    };

    let report = state.uploads.upload(files, target, &owner, None).await?;

    // Nothing landed: surface the first failure as the request's error
    if report.uploaded.is_empty() {
        if let Some(failure) = report.failed.first() {
            return Err(failure.to_error().into());
        }
    }

    Ok(JSend::success(report))
}
