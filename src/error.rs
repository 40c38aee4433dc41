use thiserror::Error;

use crate::object_store::ObjectStoreError;
use crate::storage::DatabaseError;

/// Errors surfaced by the gallery components.
#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    Permission(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Upload of '{file_name}' failed: {reason}")]
    Upload { file_name: String, reason: String },
    #[error(transparent)]
    Database(DatabaseError),
    #[error(transparent)]
    ObjectStore(#[from] ObjectStoreError),
}

impl From<DatabaseError> for GalleryError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound(what) => GalleryError::NotFound(what),
            DatabaseError::PermissionDenied(why) => GalleryError::Permission(why),
            DatabaseError::Conflict(why) => GalleryError::Validation(why),
            other => GalleryError::Database(other),
        }
    }
}

pub type Result<T, E = GalleryError> = std::result::Result<T, E>;
