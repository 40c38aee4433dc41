use redb::{ReadableTable, WriteTransaction};

use super::db::{index_add, index_ids, index_remove, Database, DatabaseError};
use super::models::{Album, AlbumUpdate, Photo, PhotoSort};
use super::photos::remove_photo_in;
use super::tables::*;

impl Database {
    // ========================================================================
    // Album operations
    // ========================================================================

    /// Create an album owned by `owner_id`. New albums are private and have no cover.
    pub fn add_album(
        &self,
        name: &str,
        description: Option<&str>,
        owner_id: &str,
    ) -> Result<Album, DatabaseError> {
        debug_assert!(!name.is_empty(), "album name must not be empty");

        let album = Album {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.map(|d| d.to_string()),
            owner_id: owner_id.to_string(),
            created_at: self.next_created_at(),
            cover_photo_url: None,
            is_public: false,
        };

        let write_txn = self.begin_write()?;
        put_album_in(&write_txn, &album)?;
        index_add(&write_txn, OWNER_ALBUMS, &album.owner_id, &album.id)?;
        self.commit(write_txn)?;
        Ok(album)
    }

    /// Get an album by its UUID
    pub fn get_album(&self, id: &str) -> Result<Option<Album>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(ALBUMS)?;

        match table.get(id)? {
            Some(data) => {
                let album: Album = rmp_serde::from_slice(data.value())?;
                Ok(Some(album))
            }
            None => Ok(None),
        }
    }

    /// All albums of an owner, newest first
    pub fn albums_by_owner(&self, owner_id: &str) -> Result<Vec<Album>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let owner_table = read_txn.open_table(OWNER_ALBUMS)?;
        let albums_table = read_txn.open_table(ALBUMS)?;

        let album_ids: Vec<String> = match owner_table.get(owner_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut albums = Vec::with_capacity(album_ids.len());
        for album_id in album_ids {
            if let Some(data) = albums_table.get(album_id.as_str())? {
                let album: Album = rmp_serde::from_slice(data.value())?;
                albums.push(album);
            }
        }

        albums.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(albums)
    }

    /// Apply a partial update. Only the owner may update an album.
    pub fn update_album(
        &self,
        id: &str,
        owner_id: &str,
        update: &AlbumUpdate,
    ) -> Result<Album, DatabaseError> {
        let write_txn = self.begin_write()?;
        let album = update_album_in(&write_txn, id, owner_id, update)?;
        self.commit(write_txn)?;
        Ok(album)
    }

    /// Set the cover only if the album has none yet. Returns whether this call won.
    pub fn set_cover_if_unset(
        &self,
        id: &str,
        owner_id: &str,
        url: &str,
    ) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let mut album = get_album_in(&write_txn, id)?
            .ok_or_else(|| DatabaseError::NotFound(format!("album {id}")))?;
        check_owner(&album.owner_id, owner_id, "album", id)?;

        if album.cover_photo_url.is_some() {
            // Dropping the transaction aborts it
            return Ok(false);
        }

        album.cover_photo_url = Some(url.to_string());
        put_album_in(&write_txn, &album)?;
        self.commit(write_txn)?;
        Ok(true)
    }

    /// Read model for the public gallery: the album and its photos, newest first.
    /// Rejected unless the album is public.
    pub fn get_public_album(&self, id: &str) -> Result<(Album, Vec<Photo>), DatabaseError> {
        let album = self
            .get_album(id)?
            .ok_or_else(|| DatabaseError::NotFound(format!("album {id}")))?;

        if !album.is_public {
            return Err(DatabaseError::PermissionDenied(format!(
                "album {id} is not public"
            )));
        }

        let mut photos = self.photos_in_album(id)?;
        PhotoSort::NewestFirst.sort(&mut photos);
        Ok((album, photos))
    }

    // ========================================================================
    // Presentation preferences
    // ========================================================================

    pub fn get_sort_preference(&self, album_id: &str) -> Result<Option<PhotoSort>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SORT_PREFERENCES)?;

        match table.get(album_id)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    pub fn set_sort_preference(
        &self,
        album_id: &str,
        owner_id: &str,
        sort: PhotoSort,
    ) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        let album = get_album_in(&write_txn, album_id)?
            .ok_or_else(|| DatabaseError::NotFound(format!("album {album_id}")))?;
        check_owner(&album.owner_id, owner_id, "album", album_id)?;
        {
            let mut table = write_txn.open_table(SORT_PREFERENCES)?;
            let data = rmp_serde::to_vec_named(&sort)?;
            table.insert(album_id, data.as_slice())?;
        }
        self.commit(write_txn)
    }
}

// ============================================================================
// Transaction-scoped helpers (shared by single operations and batches)
// ============================================================================

pub(crate) fn check_owner(
    actual: &str,
    requested: &str,
    kind: &str,
    id: &str,
) -> Result<(), DatabaseError> {
    if actual != requested {
        return Err(DatabaseError::PermissionDenied(format!(
            "{kind} {id} is not owned by {requested}"
        )));
    }
    Ok(())
}

pub(crate) fn get_album_in(
    write_txn: &WriteTransaction,
    id: &str,
) -> Result<Option<Album>, DatabaseError> {
    let table = write_txn.open_table(ALBUMS)?;
    let album = match table.get(id)? {
        Some(data) => Some(rmp_serde::from_slice(data.value())?),
        None => None,
    };
    Ok(album)
}

fn put_album_in(write_txn: &WriteTransaction, album: &Album) -> Result<(), DatabaseError> {
    let mut table = write_txn.open_table(ALBUMS)?;
    let data = rmp_serde::to_vec_named(album)?;
    table.insert(album.id.as_str(), data.as_slice())?;
    Ok(())
}

pub(crate) fn update_album_in(
    write_txn: &WriteTransaction,
    id: &str,
    owner_id: &str,
    update: &AlbumUpdate,
) -> Result<Album, DatabaseError> {
    let mut album = get_album_in(write_txn, id)?
        .ok_or_else(|| DatabaseError::NotFound(format!("album {id}")))?;
    check_owner(&album.owner_id, owner_id, "album", id)?;

    update.apply(&mut album);
    put_album_in(write_txn, &album)?;
    Ok(album)
}

/// Remove an album and every photo record still indexed under it.
/// Returns the removed album (if it existed) and the photos removed alongside.
pub(crate) fn remove_album_in(
    write_txn: &WriteTransaction,
    id: &str,
    owner_id: &str,
) -> Result<Option<(Album, Vec<Photo>)>, DatabaseError> {
    let Some(album) = get_album_in(write_txn, id)? else {
        return Ok(None);
    };
    check_owner(&album.owner_id, owner_id, "album", id)?;

    let mut cascaded = Vec::new();
    for photo_id in index_ids(write_txn, ALBUM_PHOTOS, id)? {
        if let Some(photo) = remove_photo_in(write_txn, &photo_id, owner_id)? {
            cascaded.push(photo);
        }
    }

    {
        let mut table = write_txn.open_table(ALBUMS)?;
        table.remove(id)?;
    }
    {
        let mut table = write_txn.open_table(SORT_PREFERENCES)?;
        table.remove(id)?;
    }
    index_remove(write_txn, OWNER_ALBUMS, &album.owner_id, id)?;

    Ok(Some((album, cascaded)))
}
