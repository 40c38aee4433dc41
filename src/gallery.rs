//! Consistency manager: album and photo lifecycle across the metadata database
//! and the blob store.
//!
//! The two stores fail independently. The rules kept here are:
//! - metadata is never left pointing at a blob this module deleted;
//! - an album's cover is the URL of one of its photos, or unset;
//! - blob cleanup is best-effort and its failures are reported, never fatal.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use crate::error::{GalleryError, Result};
use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::storage::models::{Album, AlbumUpdate, Patch, Photo, PhotoSort};
use crate::storage::{Batch, Database, PhotoQuery};

/// A blob that could not be removed. The metadata is gone regardless.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlobFailure {
    pub url: String,
    pub message: String,
}

/// Per-photo outcome of a deletion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeletionReport {
    /// Photo ids whose records were removed by this call
    pub deleted: Vec<String>,
    /// Photo ids that were already gone
    pub already_absent: Vec<String>,
    pub blob_failures: Vec<BlobFailure>,
    /// Albums whose cover was moved or cleared
    pub covers_updated: Vec<String>,
    /// Albums whose cover could not be repaired; the next deletion retries
    pub cover_failures: Vec<String>,
    pub album_deleted: bool,
}

#[derive(Clone)]
pub struct Gallery {
    db: Database,
    blobs: Arc<dyn ObjectStore>,
}

impl Gallery {
    pub fn new(db: Database, blobs: Arc<dyn ObjectStore>) -> Self {
        Self { db, blobs }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn blobs(&self) -> &Arc<dyn ObjectStore> {
        &self.blobs
    }

    // ========================================================================
    // Albums
    // ========================================================================

    pub fn create_album(
        &self,
        name: &str,
        description: Option<&str>,
        owner_id: &str,
    ) -> Result<Album> {
        let name = validated_name(name)?;
        let description = normalized_description(description);

        let album = self.db.add_album(name, description, owner_id)?;
        tracing::debug!(album_id = %album.id, owner_id, "Created album");
        Ok(album)
    }

    /// Rename and re-describe an album. An empty description clears it.
    pub fn update_album(
        &self,
        album_id: &str,
        owner_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Album> {
        let name = validated_name(name)?;
        let update = AlbumUpdate {
            name: Some(name.to_string()),
            description: Patch::from(Some(normalized_description(description).map(String::from))),
            ..Default::default()
        };

        let album = self.db.update_album(album_id, owner_id, &update)?;
        tracing::debug!(album_id, "Updated album");
        Ok(album)
    }

    pub fn list_albums(&self, owner_id: &str) -> Result<Vec<Album>> {
        Ok(self.db.albums_by_owner(owner_id)?)
    }

    /// Photos of an owned album in presentation order: the explicit `sort`,
    /// else the album's cached preference, else newest first.
    pub fn list_photos(
        &self,
        album_id: &str,
        owner_id: &str,
        sort: Option<PhotoSort>,
    ) -> Result<Vec<Photo>> {
        self.owned_album(album_id, owner_id)?;

        let order = match sort {
            Some(order) => order,
            None => self.db.get_sort_preference(album_id)?.unwrap_or_default(),
        };
        let mut photos = self.db.photos_in_album(album_id)?;
        order.sort(&mut photos);
        Ok(photos)
    }

    pub fn set_sort_preference(
        &self,
        album_id: &str,
        owner_id: &str,
        sort: PhotoSort,
    ) -> Result<()> {
        self.db.set_sort_preference(album_id, owner_id, sort)?;
        Ok(())
    }

    /// Album and photos (newest first) for anonymous readers. Private albums
    /// yield [`GalleryError::Permission`].
    pub fn get_public_album(&self, album_id: &str) -> Result<(Album, Vec<Photo>)> {
        Ok(self.db.get_public_album(album_id)?)
    }

    // ========================================================================
    // Covers
    // ========================================================================

    /// Explicit cover pick by the owner.
    pub fn set_cover_photo(&self, album_id: &str, photo: &Photo, owner_id: &str) -> Result<Album> {
        if photo.album_id != album_id {
            return Err(GalleryError::Validation(format!(
                "photo {} does not belong to album {album_id}",
                photo.id
            )));
        }

        let album = self.db.update_album(
            album_id,
            owner_id,
            &AlbumUpdate::cover(Some(photo.url.clone())),
        )?;
        tracing::debug!(album_id, url = %photo.url, "Set cover photo");
        Ok(album)
    }

    /// Give a fresh album its first cover. Only the first caller wins.
    pub fn bootstrap_cover(&self, album_id: &str, owner_id: &str, url: &str) -> Result<bool> {
        let won = self.db.set_cover_if_unset(album_id, owner_id, url)?;
        if won {
            tracing::debug!(album_id, url, "Bootstrapped album cover");
        }
        Ok(won)
    }

    /// Repair the cover of `album_id` after the photos behind `deleted_urls`
    /// were removed. The newest remaining photo takes over, or the cover is
    /// cleared. Returns whether the cover changed.
    ///
    /// Runs as a read followed by a write; a concurrent upload can leave the
    /// cover one step stale until the next deletion repairs it.
    async fn reassign_cover(
        &self,
        album_id: &str,
        owner_id: &str,
        deleted_urls: &HashSet<String>,
    ) -> Result<bool> {
        let Some(album) = self.db.get_album(album_id)? else {
            return Ok(false);
        };
        let Some(ref cover) = album.cover_photo_url else {
            return Ok(false);
        };
        if !deleted_urls.contains(cover) {
            return Ok(false);
        }

        let replacement = self
            .db
            .query_photos(&PhotoQuery::newest_in_album(album_id))?
            .into_iter()
            .next()
            .map(|photo| photo.url);

        self.db
            .update_album(album_id, owner_id, &AlbumUpdate::cover(replacement.clone()))?;
        match replacement {
            Some(url) => tracing::debug!(album_id, %url, "Reassigned album cover"),
            None => tracing::debug!(album_id, "Cleared album cover"),
        }
        Ok(true)
    }

    /// Cover repair after the deletion itself has landed. A failure is logged
    /// and reported, never raised.
    async fn repair_cover(
        &self,
        album_id: &str,
        owner_id: &str,
        deleted_urls: &HashSet<String>,
        report: &mut DeletionReport,
    ) {
        match self.reassign_cover(album_id, owner_id, deleted_urls).await {
            Ok(true) => report.covers_updated.push(album_id.to_string()),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(album_id, error = %e, "Failed to repair album cover");
                report.cover_failures.push(album_id.to_string());
            }
        }
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Delete one photo: metadata first, then its blob, then repair the cover.
    pub async fn delete_single_photo(&self, photo: &Photo, owner_id: &str) -> Result<DeletionReport> {
        let mut report = DeletionReport::default();

        if self.db.delete_photo(&photo.id, owner_id)? {
            report.deleted.push(photo.id.clone());
        } else {
            report.already_absent.push(photo.id.clone());
        }

        if let Some(failure) = self.delete_blob(&photo.url).await {
            report.blob_failures.push(failure);
        }

        let deleted_urls = HashSet::from([photo.url.clone()]);
        self.repair_cover(&photo.album_id, owner_id, &deleted_urls, &mut report)
            .await;

        tracing::debug!(photo_id = %photo.id, "Deleted photo");
        Ok(report)
    }

    /// Delete a selection in one atomic metadata batch, clean up the blobs
    /// concurrently, then repair each affected album's cover once.
    pub async fn delete_selection(&self, photo_ids: &[String], owner_id: &str) -> Result<DeletionReport> {
        let mut report = DeletionReport::default();
        let mut seen = HashSet::new();
        let mut batch = Batch::new();

        for id in photo_ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            match self.db.get_photo(id)? {
                Some(_) => {
                    batch.delete_photo(id.clone());
                }
                None => report.already_absent.push(id.clone()),
            }
        }

        let outcome = self.db.commit_batch(owner_id, batch)?;
        report.already_absent.extend(outcome.missing);

        // Group by album so every cover is evaluated once against the full set
        let mut by_album: BTreeMap<String, HashSet<String>> = BTreeMap::new();
        for photo in &outcome.deleted_photos {
            report.deleted.push(photo.id.clone());
            by_album
                .entry(photo.album_id.clone())
                .or_default()
                .insert(photo.url.clone());
        }

        let urls: Vec<&str> = outcome.deleted_photos.iter().map(|p| p.url.as_str()).collect();
        report.blob_failures = self.delete_blobs(&urls).await;

        for (album_id, deleted_urls) in &by_album {
            self.repair_cover(album_id, owner_id, deleted_urls, &mut report)
                .await;
        }

        tracing::debug!(
            deleted = report.deleted.len(),
            absent = report.already_absent.len(),
            blob_failures = report.blob_failures.len(),
            "Deleted selection"
        );
        Ok(report)
    }

    /// Delete an album and everything in it.
    ///
    /// Phase 1 removes the blobs (best-effort, concurrent). Phase 2 removes
    /// every photo record and the album record in one atomic batch, whatever
    /// phase 1 reported. An orphaned blob is possible; a record pointing at a
    /// deleted blob is not.
    pub async fn delete_album(&self, album_id: &str, owner_id: &str) -> Result<DeletionReport> {
        self.owned_album(album_id, owner_id)?;
        let mut report = DeletionReport::default();

        // Phase 1
        let photos = self.db.photos_in_album(album_id)?;
        let urls: Vec<&str> = photos.iter().map(|p| p.url.as_str()).collect();
        report.blob_failures = self.delete_blobs(&urls).await;

        // Phase 2
        let mut batch = Batch::new();
        for photo in &photos {
            batch.delete_photo(photo.id.clone());
        }
        batch.delete_album(album_id);
        let outcome = self.db.commit_batch(owner_id, batch)?;

        // Photos uploaded between the phases were cascaded by the album delete
        let cleaned: HashSet<&str> = urls.iter().copied().collect();
        let late: Vec<&str> = outcome
            .deleted_photos
            .iter()
            .map(|p| p.url.as_str())
            .filter(|url| !cleaned.contains(url))
            .collect();
        if !late.is_empty() {
            report.blob_failures.extend(self.delete_blobs(&late).await);
        }

        report.deleted = outcome.deleted_photos.iter().map(|p| p.id.clone()).collect();
        report.already_absent = outcome
            .missing
            .into_iter()
            .filter(|id| id != album_id)
            .collect();
        report.album_deleted = !outcome.deleted_albums.is_empty();

        tracing::debug!(
            album_id,
            photos = report.deleted.len(),
            blob_failures = report.blob_failures.len(),
            "Deleted album"
        );
        Ok(report)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn owned_album(&self, album_id: &str, owner_id: &str) -> Result<Album> {
        let album = self
            .db
            .get_album(album_id)?
            .ok_or_else(|| GalleryError::NotFound(format!("album {album_id}")))?;
        if album.owner_id != owner_id {
            return Err(GalleryError::Permission(format!(
                "album {album_id} is not owned by {owner_id}"
            )));
        }
        Ok(album)
    }

    /// Best-effort blob delete. A blob that is already gone counts as deleted.
    async fn delete_blob(&self, url: &str) -> Option<BlobFailure> {
        match self.blobs.delete_by_url(url).await {
            Ok(()) | Err(ObjectStoreError::NotFound(_)) => None,
            Err(e) => {
                tracing::warn!(%url, error = %e, "Failed to delete blob, leaving it orphaned");
                Some(BlobFailure {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    async fn delete_blobs(&self, urls: &[&str]) -> Vec<BlobFailure> {
        join_all(urls.iter().map(|url| self.delete_blob(url)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

fn validated_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(GalleryError::Validation(
            "album name must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}

fn normalized_description(description: Option<&str>) -> Option<&str> {
    description.map(str::trim).filter(|d| !d.is_empty())
}
