use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::api::response::{ApiError, AppJson, JSend, Owner};
use crate::gallery::DeletionReport;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DeleteSelectionRequest {
    pub photo_ids: Vec<String>,
}

pub async fn delete_photo(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<JSend<DeletionReport>>, ApiError> {
    let photo = state
        .db
        .get_photo(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    // Deleting what is already gone succeeds
    let report = match photo {
        Some(photo) => state.gallery.delete_single_photo(&photo, &owner).await?,
        None => DeletionReport {
            already_absent: vec![id],
            ..Default::default()
        },
    };

    Ok(JSend::success(report))
}

pub async fn delete_selection(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    AppJson(req): AppJson<DeleteSelectionRequest>,
) -> Result<Json<JSend<DeletionReport>>, ApiError> {
    if req.photo_ids.is_empty() {
        return Err(ApiError::bad_request("photo_ids must not be empty"));
    }

    let report = state
        .gallery
        .delete_selection(&req.photo_ids, &owner)
        .await?;
    Ok(JSend::success(report))
}
