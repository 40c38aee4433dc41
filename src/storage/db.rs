use chrono::{DateTime, Utc};
use redb::{Database as RedbDatabase, ReadTransaction, ReadableTable, WriteTransaction};
use std::path::Path;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

use super::tables::*;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(Box<redb::CommitError>),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Redb(Box<redb::Error>),
    #[error("Database error: {0}")]
    RedbDatabase(Box<redb::DatabaseError>),
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),
    #[error("Storage error: {0}")]
    Storage(Box<redb::StorageError>),
    #[error("Table error: {0}")]
    Table(Box<redb::TableError>),
    #[error("Transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
}

impl From<redb::CommitError> for DatabaseError {
    fn from(e: redb::CommitError) -> Self {
        DatabaseError::Commit(Box::new(e))
    }
}

impl From<redb::DatabaseError> for DatabaseError {
    fn from(e: redb::DatabaseError) -> Self {
        DatabaseError::RedbDatabase(Box::new(e))
    }
}

impl From<redb::Error> for DatabaseError {
    fn from(e: redb::Error) -> Self {
        DatabaseError::Redb(Box::new(e))
    }
}

impl From<redb::StorageError> for DatabaseError {
    fn from(e: redb::StorageError) -> Self {
        DatabaseError::Storage(Box::new(e))
    }
}

impl From<redb::TableError> for DatabaseError {
    fn from(e: redb::TableError) -> Self {
        DatabaseError::Table(Box::new(e))
    }
}

impl From<redb::TransactionError> for DatabaseError {
    fn from(e: redb::TransactionError) -> Self {
        DatabaseError::Transaction(Box::new(e))
    }
}

/// Handle to the metadata store. Cheap to clone; all clones share the same
/// redb instance, change feed and creation clock.
pub struct Database {
    db: Arc<RedbDatabase>,
    changes: broadcast::Sender<u64>,
    sequence: Arc<AtomicU64>,
    last_created_micros: Arc<AtomicI64>,
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            changes: self.changes.clone(),
            sequence: Arc::clone(&self.sequence),
            last_created_micros: Arc::clone(&self.last_created_micros),
        }
    }
}

/// Statistics from a purge operation
#[derive(Debug, Default)]
pub struct PurgeStats {
    pub albums: u64,
    pub photos: u64,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("gallery.redb");
        let db = Arc::new(RedbDatabase::create(db_path)?);

        // Initialize application tables
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ALBUMS)?;
            let _ = write_txn.open_table(PHOTOS)?;
            let _ = write_txn.open_table(ALBUM_PHOTOS)?;
            let _ = write_txn.open_table(OWNER_ALBUMS)?;
            let _ = write_txn.open_table(PHOTO_URLS)?;
            let _ = write_txn.open_table(SORT_PREFERENCES)?;
        }
        write_txn.commit()?;

        let (changes, _) = broadcast::channel(256);

        Ok(Self {
            db,
            changes,
            sequence: Arc::new(AtomicU64::new(0)),
            last_created_micros: Arc::new(AtomicI64::new(0)),
        })
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, DatabaseError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, DatabaseError> {
        Ok(self.db.begin_write()?)
    }

    /// Commit a write transaction and wake live queries.
    pub(crate) fn commit(&self, write_txn: WriteTransaction) -> Result<(), DatabaseError> {
        write_txn.commit()?;
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        // No receivers just means no live queries are open.
        let _ = self.changes.send(seq);
        Ok(())
    }

    /// Receiver that yields a sequence number after every committed change.
    pub fn changes(&self) -> broadcast::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Creation timestamp for a new record. Strictly increasing across the store so
    /// "most recently created" never ties.
    pub(crate) fn next_created_at(&self) -> DateTime<Utc> {
        let now = Utc::now().timestamp_micros();
        let previous = match self.last_created_micros.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |last| Some(now.max(last + 1)),
        ) {
            Ok(prev) | Err(prev) => prev,
        };
        let assigned = now.max(previous + 1);
        DateTime::from_timestamp_micros(assigned).unwrap_or_else(Utc::now)
    }

    // ========================================================================
    // Admin operations
    // ========================================================================

    /// Purge all data - for testing only
    pub fn purge_all(&self) -> Result<PurgeStats, DatabaseError> {
        let write_txn = self.begin_write()?;
        let mut stats = PurgeStats::default();

        stats.albums = clear_table(&write_txn, ALBUMS)?;
        stats.photos = clear_table(&write_txn, PHOTOS)?;
        clear_table(&write_txn, ALBUM_PHOTOS)?;
        clear_table(&write_txn, OWNER_ALBUMS)?;
        clear_table(&write_txn, SORT_PREFERENCES)?;

        // URL index has a different value type
        {
            let table = write_txn.open_table(PHOTO_URLS)?;
            let keys: Vec<String> = table
                .iter()?
                .map(|r| r.map(|(k, _)| k.value().to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            drop(table);

            let mut table = write_txn.open_table(PHOTO_URLS)?;
            for key in keys {
                table.remove(key.as_str())?;
            }
        }

        self.commit(write_txn)?;
        Ok(stats)
    }
}

fn clear_table(write_txn: &WriteTransaction, def: BytesTable) -> Result<u64, DatabaseError> {
    let table = write_txn.open_table(def)?;
    let keys: Vec<String> = table
        .iter()?
        .map(|r| r.map(|(k, _)| k.value().to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    drop(table);

    let mut table = write_txn.open_table(def)?;
    let mut removed = 0;
    for key in keys {
        table.remove(key.as_str())?;
        removed += 1;
    }
    Ok(removed)
}

// ============================================================================
// Id-list index helpers
// ============================================================================

pub(crate) fn index_ids(
    write_txn: &WriteTransaction,
    def: BytesTable,
    key: &str,
) -> Result<Vec<String>, DatabaseError> {
    let table = write_txn.open_table(def)?;
    let ids = match table.get(key)? {
        Some(data) => rmp_serde::from_slice(data.value())?,
        None => Vec::new(),
    };
    Ok(ids)
}

pub(crate) fn index_add(
    write_txn: &WriteTransaction,
    def: BytesTable,
    key: &str,
    id: &str,
) -> Result<(), DatabaseError> {
    let mut ids = index_ids(write_txn, def, key)?;
    if !ids.iter().any(|existing| existing == id) {
        ids.push(id.to_string());
        let data = rmp_serde::to_vec_named(&ids)?;
        let mut table = write_txn.open_table(def)?;
        table.insert(key, data.as_slice())?;
    }
    Ok(())
}

pub(crate) fn index_remove(
    write_txn: &WriteTransaction,
    def: BytesTable,
    key: &str,
    id: &str,
) -> Result<(), DatabaseError> {
    let mut ids = index_ids(write_txn, def, key)?;
    let before = ids.len();
    ids.retain(|existing| existing != id);
    if ids.len() == before {
        return Ok(());
    }

    let mut table = write_txn.open_table(def)?;
    if ids.is_empty() {
        table.remove(key)?;
    } else {
        let data = rmp_serde::to_vec_named(&ids)?;
        table.insert(key, data.as_slice())?;
    }
    Ok(())
}
