use redb::{ReadableTable, WriteTransaction};

use super::albums::{check_owner, get_album_in};
use super::db::{index_add, index_remove, Database, DatabaseError};
use super::models::{NewPhoto, Photo};
use super::query::PhotoQuery;
use super::tables::*;

impl Database {
    // ========================================================================
    // Photo operations
    // ========================================================================

    /// Store a photo record once its bytes are durably stored. The album must
    /// exist and belong to the same owner; the URL must not be in use.
    pub fn add_photo(&self, new_photo: NewPhoto) -> Result<Photo, DatabaseError> {
        debug_assert!(!new_photo.url.is_empty(), "photo url must not be empty");

        let write_txn = self.begin_write()?;

        let album = get_album_in(&write_txn, &new_photo.album_id)?
            .ok_or_else(|| DatabaseError::NotFound(format!("album {}", new_photo.album_id)))?;
        check_owner(
            &album.owner_id,
            &new_photo.owner_id,
            "album",
            &new_photo.album_id,
        )?;

        let url_taken = {
            let url_table = write_txn.open_table(PHOTO_URLS)?;
            let taken = url_table.get(new_photo.url.as_str())?.is_some();
            taken
        };
        if url_taken {
            return Err(DatabaseError::Conflict(format!(
                "url '{}' already belongs to a photo",
                new_photo.url
            )));
        }

        let photo = Photo {
            id: uuid::Uuid::new_v4().to_string(),
            album_id: new_photo.album_id,
            owner_id: new_photo.owner_id,
            url: new_photo.url,
            file_name: new_photo.file_name,
            created_at: self.next_created_at(),
            media_kind: new_photo.media_kind,
        };

        {
            let mut table = write_txn.open_table(PHOTOS)?;
            let data = rmp_serde::to_vec_named(&photo)?;
            table.insert(photo.id.as_str(), data.as_slice())?;

            let mut url_table = write_txn.open_table(PHOTO_URLS)?;
            url_table.insert(photo.url.as_str(), photo.id.as_str())?;
        }
        index_add(&write_txn, ALBUM_PHOTOS, &photo.album_id, &photo.id)?;

        self.commit(write_txn)?;
        Ok(photo)
    }

    /// Get a photo by its UUID
    pub fn get_photo(&self, id: &str) -> Result<Option<Photo>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(PHOTOS)?;

        match table.get(id)? {
            Some(data) => {
                let photo: Photo = rmp_serde::from_slice(data.value())?;
                Ok(Some(photo))
            }
            None => Ok(None),
        }
    }

    /// Get a photo by its blob URL
    pub fn get_photo_by_url(&self, url: &str) -> Result<Option<Photo>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let url_table = read_txn.open_table(PHOTO_URLS)?;

        let id = match url_table.get(url)? {
            Some(data) => data.value().to_string(),
            None => return Ok(None),
        };

        let photos_table = read_txn.open_table(PHOTOS)?;
        match photos_table.get(id.as_str())? {
            Some(data) => {
                let photo: Photo = rmp_serde::from_slice(data.value())?;
                Ok(Some(photo))
            }
            None => Ok(None),
        }
    }

    /// All photos of an album, in index order (no presentation order implied)
    pub fn photos_in_album(&self, album_id: &str) -> Result<Vec<Photo>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let index_table = read_txn.open_table(ALBUM_PHOTOS)?;
        let photos_table = read_txn.open_table(PHOTOS)?;

        let photo_ids: Vec<String> = match index_table.get(album_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut photos = Vec::with_capacity(photo_ids.len());
        for photo_id in photo_ids {
            if let Some(data) = photos_table.get(photo_id.as_str())? {
                let photo: Photo = rmp_serde::from_slice(data.value())?;
                photos.push(photo);
            }
        }

        Ok(photos)
    }

    /// Get all photos (admin and unscoped queries)
    pub fn get_all_photos(&self) -> Result<Vec<Photo>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(PHOTOS)?;

        let mut photos = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let photo: Photo = rmp_serde::from_slice(value.value())?;
            photos.push(photo);
        }

        Ok(photos)
    }

    /// Run an equality/range query with optional ordering and limit
    pub fn query_photos(&self, query: &PhotoQuery) -> Result<Vec<Photo>, DatabaseError> {
        let candidates = match query.album_id {
            Some(ref album_id) => self.photos_in_album(album_id)?,
            None => self.get_all_photos()?,
        };
        Ok(query.select(candidates))
    }

    /// Delete a photo record. Returns `false` when it was already gone.
    pub fn delete_photo(&self, id: &str, owner_id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let removed = remove_photo_in(&write_txn, id, owner_id)?;
        match removed {
            Some(_) => {
                self.commit(write_txn)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Remove a photo record and its index entries inside an open write transaction.
pub(crate) fn remove_photo_in(
    write_txn: &WriteTransaction,
    id: &str,
    owner_id: &str,
) -> Result<Option<Photo>, DatabaseError> {
    let existing: Option<Photo> = {
        let table = write_txn.open_table(PHOTOS)?;
        let result = match table.get(id)? {
            Some(data) => Some(rmp_serde::from_slice(data.value())?),
            None => None,
        };
        result
    };

    let Some(photo) = existing else {
        return Ok(None);
    };
    check_owner(&photo.owner_id, owner_id, "photo", id)?;

    {
        let mut table = write_txn.open_table(PHOTOS)?;
        table.remove(id)?;
    }
    {
        let mut url_table = write_txn.open_table(PHOTO_URLS)?;
        url_table.remove(photo.url.as_str())?;
    }
    index_remove(write_txn, ALBUM_PHOTOS, &photo.album_id, id)?;

    Ok(Some(photo))
}
