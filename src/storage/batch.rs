use super::albums::{remove_album_in, update_album_in};
use super::db::{Database, DatabaseError};
use super::models::{Album, AlbumUpdate, BatchOp, Photo};
use super::photos::remove_photo_in;

/// An atomic multi-document write. Build it up, then hand it to
/// [`Database::commit_batch`]; either every operation lands or none does.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delete_photo(&mut self, id: impl Into<String>) -> &mut Self {
        self.ops.push(BatchOp::DeletePhoto { id: id.into() });
        self
    }

    pub fn delete_album(&mut self, id: impl Into<String>) -> &mut Self {
        self.ops.push(BatchOp::DeleteAlbum { id: id.into() });
        self
    }

    pub fn update_album(&mut self, id: impl Into<String>, update: AlbumUpdate) -> &mut Self {
        self.ops.push(BatchOp::UpdateAlbum {
            id: id.into(),
            update,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }
}

/// What a committed batch actually changed
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Photo records removed, including those removed by an album cascade
    pub deleted_photos: Vec<Photo>,
    /// Ids named by delete operations that were already absent
    pub missing: Vec<String>,
    pub deleted_albums: Vec<Album>,
    pub updated_albums: Vec<Album>,
}

impl Database {
    /// Commit a batch as one write transaction on behalf of `owner_id`.
    ///
    /// Deleting an absent document is not an error; it is reported in
    /// [`BatchOutcome::missing`]. A permission failure or a missing album in an
    /// update aborts the whole batch.
    pub fn commit_batch(&self, owner_id: &str, batch: Batch) -> Result<BatchOutcome, DatabaseError> {
        let mut outcome = BatchOutcome::default();
        if batch.is_empty() {
            return Ok(outcome);
        }

        let write_txn = self.begin_write()?;
        for op in batch.ops {
            match op {
                BatchOp::DeletePhoto { id } => match remove_photo_in(&write_txn, &id, owner_id)? {
                    Some(photo) => outcome.deleted_photos.push(photo),
                    None => outcome.missing.push(id),
                },
                BatchOp::DeleteAlbum { id } => match remove_album_in(&write_txn, &id, owner_id)? {
                    Some((album, cascaded)) => {
                        outcome.deleted_photos.extend(cascaded);
                        outcome.deleted_albums.push(album);
                    }
                    None => outcome.missing.push(id),
                },
                BatchOp::UpdateAlbum { id, update } => {
                    let album = update_album_in(&write_txn, &id, owner_id, &update)?;
                    outcome.updated_albums.push(album);
                }
            }
        }
        self.commit(write_txn)?;

        tracing::debug!(
            photos = outcome.deleted_photos.len(),
            albums = outcome.deleted_albums.len(),
            updates = outcome.updated_albums.len(),
            missing = outcome.missing.len(),
            "Committed batch"
        );
        Ok(outcome)
    }
}
