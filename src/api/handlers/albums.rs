use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{album_to_response, photo_to_response, AlbumResponse, PhotoResponse};
use crate::api::response::{
    ApiError, AppJson, AppQuery, JSend, JSendPaginated, Owner, Pagination,
};
use crate::gallery::DeletionReport;
use crate::storage::models::PhotoSort;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateAlbumRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAlbumRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub is_public: bool,
}

#[derive(Debug, Deserialize)]
pub struct CoverRequest {
    pub photo_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SortRequest {
    pub sort: String,
}

#[derive(Debug, Serialize)]
pub struct SortResponse {
    pub sort: String,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub embed_snippet: String,
    pub is_public: bool,
    pub link: String,
}

#[derive(Debug, Deserialize)]
pub struct ListAlbumsParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Debug, Deserialize)]
pub struct ListPhotosParams {
    #[serde(default)]
    pub sort: Option<String>,
}

fn default_limit() -> u32 {
    20
}

fn parse_sort(raw: &str) -> Result<PhotoSort, ApiError> {
    raw.parse().map_err(ApiError::bad_request)
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_albums(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    AppQuery(params): AppQuery<ListAlbumsParams>,
) -> Result<Json<JSendPaginated<AlbumResponse>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let albums = state.gallery.list_albums(&owner)?;
    let total = albums.len() as u64;
    let size = state.config.viewer.thumbnail_size;
    let items: Vec<AlbumResponse> = albums
        .iter()
        .skip(params.offset as usize)
        .take(params.limit as usize)
        .map(|album| album_to_response(album, size))
        .collect();

    Ok(JSendPaginated::success(
        items,
        Pagination {
            limit: params.limit,
            offset: params.offset,
            total,
        },
    ))
}

pub async fn create_album(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    AppJson(req): AppJson<CreateAlbumRequest>,
) -> Result<Json<JSend<AlbumResponse>>, ApiError> {
    let album = state
        .gallery
        .create_album(&req.name, req.description.as_deref(), &owner)?;

    Ok(JSend::success(album_to_response(
        &album,
        state.config.viewer.thumbnail_size,
    )))
}

pub async fn update_album(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateAlbumRequest>,
) -> Result<Json<JSend<AlbumResponse>>, ApiError> {
    let album = state
        .gallery
        .update_album(&id, &owner, &req.name, req.description.as_deref())?;

    Ok(JSend::success(album_to_response(
        &album,
        state.config.viewer.thumbnail_size,
    )))
}

pub async fn delete_album(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<JSend<DeletionReport>>, ApiError> {
    let report = state.gallery.delete_album(&id, &owner).await?;
    Ok(JSend::success(report))
}

pub async fn set_visibility(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    AppJson(req): AppJson<VisibilityRequest>,
) -> Result<Json<JSend<AlbumResponse>>, ApiError> {
    let album = state.sharing.set_public(&id, &owner, req.is_public)?;

    Ok(JSend::success(album_to_response(
        &album,
        state.config.viewer.thumbnail_size,
    )))
}

pub async fn set_cover(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    AppJson(req): AppJson<CoverRequest>,
) -> Result<Json<JSend<AlbumResponse>>, ApiError> {
    let photo = state
        .db
        .get_photo(&req.photo_id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Photo not found"))?;

    let album = state.gallery.set_cover_photo(&id, &photo, &owner)?;

    Ok(JSend::success(album_to_response(
        &album,
        state.config.viewer.thumbnail_size,
    )))
}

pub async fn share_album(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<JSend<ShareResponse>>, ApiError> {
    let album = state
        .db
        .get_album(&id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Album not found"))?;
    if album.owner_id != owner {
        return Err(ApiError::forbidden("Only the owner can share this album"));
    }

    Ok(JSend::success(ShareResponse {
        embed_snippet: state.sharing.build_embed_snippet(&album.id, &album.name),
        is_public: album.is_public,
        link: state.sharing.build_share_link(&album.id),
    }))
}

pub async fn list_photos(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    AppQuery(params): AppQuery<ListPhotosParams>,
) -> Result<Json<JSend<Vec<PhotoResponse>>>, ApiError> {
    let sort = params.sort.as_deref().map(parse_sort).transpose()?;
    let photos = state.gallery.list_photos(&id, &owner, sort)?;

    let size = state.config.viewer.thumbnail_size;
    Ok(JSend::success(
        photos.iter().map(|p| photo_to_response(p, size)).collect(),
    ))
}

pub async fn set_sort(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    AppJson(req): AppJson<SortRequest>,
) -> Result<Json<JSend<SortResponse>>, ApiError> {
    let sort = parse_sort(&req.sort)?;
    state.gallery.set_sort_preference(&id, &owner, sort)?;

    tracing::debug!(album_id = %id, %sort, "Cached sort preference");
    Ok(JSend::success(SortResponse {
        sort: sort.to_string(),
    }))
}
