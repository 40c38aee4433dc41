use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Three-state patch value for partial updates that survives serialization round-trips.
/// Unlike `Option<Option<T>>`, each variant has a distinct wire representation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Patch<T> {
    /// Field is left untouched.
    #[default]
    Absent,
    /// Field is cleared.
    Null,
    /// Field is set to a new value.
    Value(T),
}

impl<T> From<Option<Option<T>>> for Patch<T> {
    fn from(v: Option<Option<T>>) -> Self {
        match v {
            None => Patch::Absent,
            Some(None) => Patch::Null,
            Some(Some(v)) => Patch::Value(v),
        }
    }
}

impl<T: Clone> Patch<T> {
    /// Apply the patch to an optional field in place.
    pub fn apply_to(&self, field: &mut Option<T>) {
        match self {
            Patch::Absent => {}
            Patch::Null => *field = None,
            Patch::Value(v) => *field = Some(v.clone()),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }
}

/// Kind of media a photo record points at, derived from its MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Anything that is not `video/*` is treated as an image.
    pub fn from_mime(mime_type: &str) -> Self {
        let primary = mime_type.split('/').next().unwrap_or("").trim();
        if primary.eq_ignore_ascii_case("video") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

/// An album record stored in redb
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub cover_photo_url: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

/// A photo (or video) record stored in redb.
///
/// `url` is the blob store reference and doubles as the content identity:
/// no two photo records share a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    pub album_id: String,
    pub owner_id: String,
    pub url: String,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub media_kind: MediaKind,
}

/// Input for a new photo record; the store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub album_id: String,
    pub owner_id: String,
    pub url: String,
    pub file_name: String,
    pub media_kind: MediaKind,
}

/// Partial update of an album's mutable fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlbumUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Patch<String>,
    #[serde(default)]
    pub cover_photo_url: Patch<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

impl AlbumUpdate {
    /// Point the cover at `url`, or clear it when `None`.
    pub fn cover(url: Option<String>) -> Self {
        Self {
            cover_photo_url: Patch::from(Some(url)),
            ..Default::default()
        }
    }

    pub fn visibility(is_public: bool) -> Self {
        Self {
            is_public: Some(is_public),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_absent()
            && self.cover_photo_url.is_absent()
            && self.is_public.is_none()
    }

    pub(crate) fn apply(&self, album: &mut Album) {
        if let Some(ref name) = self.name {
            album.name = name.clone();
        }
        self.description.apply_to(&mut album.description);
        self.cover_photo_url.apply_to(&mut album.cover_photo_url);
        if let Some(is_public) = self.is_public {
            album.is_public = is_public;
        }
    }
}

/// Operations allowed inside an atomic batch. No reads are exposed to the caller
/// between operations; the whole batch commits or none of it does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BatchOp {
    DeletePhoto { id: String },
    /// Removes the album record together with any photo still indexed under it.
    DeleteAlbum { id: String },
    UpdateAlbum { id: String, update: AlbumUpdate },
}

/// Client-side presentation order of an album's photos
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoSort {
    #[default]
    NewestFirst,
    OldestFirst,
    FileName,
}

impl PhotoSort {
    pub fn compare(&self, a: &Photo, b: &Photo) -> Ordering {
        match self {
            PhotoSort::NewestFirst => b.created_at.cmp(&a.created_at),
            PhotoSort::OldestFirst => a.created_at.cmp(&b.created_at),
            PhotoSort::FileName => a
                .file_name
                .cmp(&b.file_name)
                .then_with(|| a.created_at.cmp(&b.created_at)),
        }
    }

    pub fn sort(&self, photos: &mut [Photo]) {
        photos.sort_by(|a, b| self.compare(a, b));
    }
}

impl FromStr for PhotoSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "newest" | "newest_first" | "desc" => Ok(PhotoSort::NewestFirst),
            "oldest" | "oldest_first" | "asc" => Ok(PhotoSort::OldestFirst),
            "name" | "file_name" => Ok(PhotoSort::FileName),
            other => Err(format!("unknown sort order '{other}'")),
        }
    }
}

impl fmt::Display for PhotoSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PhotoSort::NewestFirst => "newest_first",
            PhotoSort::OldestFirst => "oldest_first",
            PhotoSort::FileName => "file_name",
        };
        f.write_str(s)
    }
}
