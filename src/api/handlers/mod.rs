mod admin;
mod albums;
mod blobs;
mod photos;
mod public;
mod uploads;

use serde::Serialize;

use crate::storage::models::{Album, MediaKind, Photo};
use crate::thumbnail::{thumbnail_url_with_size, ThumbnailSize};

pub use admin::{admin_purge, health};
pub use albums::{
    create_album, delete_album, list_albums, list_photos, set_cover, set_sort, set_visibility,
    share_album, update_album,
};
pub use blobs::serve_blob;
pub use photos::{delete_photo, delete_selection};
pub use public::get_public_album;
pub use uploads::create_upload;

// ============================================================================
// Shared response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct AlbumResponse {
    pub cover_photo_url: Option<String>,
    pub cover_thumbnail_url: Option<String>,
    pub created_at: String,
    pub description: Option<String>,
    pub id: String,
    pub is_public: bool,
    pub name: String,
    pub owner_id: String,
}

#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    pub album_id: String,
    pub created_at: String,
    pub file_name: String,
    pub id: String,
    pub media_kind: MediaKind,
    pub thumbnail_url: String,
    pub url: String,
}

fn album_to_response(album: &Album, size: ThumbnailSize) -> AlbumResponse {
    AlbumResponse {
        cover_photo_url: album.cover_photo_url.clone(),
        cover_thumbnail_url: album
            .cover_photo_url
            .as_deref()
            .map(|url| thumbnail_url_with_size(url, size)),
        created_at: album.created_at.to_rfc3339(),
        description: album.description.clone(),
        id: album.id.clone(),
        is_public: album.is_public,
        name: album.name.clone(),
        owner_id: album.owner_id.clone(),
    }
}

fn photo_to_response(photo: &Photo, size: ThumbnailSize) -> PhotoResponse {
    PhotoResponse {
        album_id: photo.album_id.clone(),
        created_at: photo.created_at.to_rfc3339(),
        file_name: photo.file_name.clone(),
        id: photo.id.clone(),
        media_kind: photo.media_kind,
        thumbnail_url: thumbnail_url_with_size(&photo.url, size),
        url: photo.url.clone(),
    }
}
