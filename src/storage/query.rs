use chrono::{DateTime, Utc};

use super::db::{Database, DatabaseError};
use super::models::{Album, Photo, PhotoSort};

/// Equality/range filter over photo records with optional ordering and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoQuery {
    pub album_id: Option<String>,
    pub owner_id: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub order: Option<PhotoSort>,
    pub limit: Option<usize>,
}

impl PhotoQuery {
    pub fn in_album(album_id: impl Into<String>) -> Self {
        Self {
            album_id: Some(album_id.into()),
            ..Default::default()
        }
    }

    pub fn owned_by(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn created_after(mut self, at: DateTime<Utc>) -> Self {
        self.created_after = Some(at);
        self
    }

    pub fn created_before(mut self, at: DateTime<Utc>) -> Self {
        self.created_before = Some(at);
        self
    }

    pub fn order_by(mut self, order: PhotoSort) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Newest photo of an album, the canonical cover candidate.
    pub fn newest_in_album(album_id: impl Into<String>) -> Self {
        Self::in_album(album_id)
            .order_by(PhotoSort::NewestFirst)
            .limit(1)
    }

    fn matches(&self, photo: &Photo) -> bool {
        self.album_id.as_deref().map_or(true, |id| photo.album_id == id)
            && self.owner_id.as_deref().map_or(true, |id| photo.owner_id == id)
            && self.created_after.map_or(true, |at| photo.created_at > at)
            && self.created_before.map_or(true, |at| photo.created_at < at)
    }

    pub(crate) fn select(&self, candidates: Vec<Photo>) -> Vec<Photo> {
        let mut photos: Vec<Photo> = candidates.into_iter().filter(|p| self.matches(p)).collect();
        if let Some(order) = self.order {
            order.sort(&mut photos);
        }
        if let Some(limit) = self.limit {
            photos.truncate(limit);
        }
        photos
    }
}

/// Albums of one owner, newest first
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumQuery {
    pub owner_id: String,
}

impl AlbumQuery {
    pub fn owned_by(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
        }
    }
}

/// A query that can back a live subscription.
pub trait LiveQuery: Send + Sync + 'static {
    type Item: Clone + PartialEq + Send + 'static;

    fn run(&self, db: &Database) -> Result<Vec<Self::Item>, DatabaseError>;
}

impl LiveQuery for PhotoQuery {
    type Item = Photo;

    fn run(&self, db: &Database) -> Result<Vec<Photo>, DatabaseError> {
        db.query_photos(self)
    }
}

impl LiveQuery for AlbumQuery {
    type Item = Album;

    fn run(&self, db: &Database) -> Result<Vec<Album>, DatabaseError> {
        db.albums_by_owner(&self.owner_id)
    }
}

/// A single album document, watched for changes (e.g. its cover or visibility).
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumDocument {
    pub album_id: String,
}

impl LiveQuery for AlbumDocument {
    type Item = Album;

    fn run(&self, db: &Database) -> Result<Vec<Album>, DatabaseError> {
        Ok(db.get_album(&self.album_id)?.into_iter().collect())
    }
}
