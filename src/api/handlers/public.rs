use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use super::{photo_to_response, PhotoResponse};
use crate::api::response::{ApiError, JSend};
use crate::AppState;

/// Album as anonymous readers see it: no owner, no visibility flag.
#[derive(Debug, Serialize)]
pub struct PublicAlbumResponse {
    pub cover_photo_url: Option<String>,
    pub description: Option<String>,
    pub id: String,
    pub name: String,
    pub photos: Vec<PhotoResponse>,
}

/// Route: GET /public/albums/:id
pub async fn get_public_album(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<PublicAlbumResponse>>, ApiError> {
    let (album, photos) = state.gallery.get_public_album(&id)?;

    let size = state.config.viewer.thumbnail_size;
    Ok(JSend::success(PublicAlbumResponse {
        cover_photo_url: album.cover_photo_url,
        description: album.description,
        id: album.id,
        name: album.name,
        photos: photos.iter().map(|p| photo_to_response(p, size)).collect(),
    }))
}
