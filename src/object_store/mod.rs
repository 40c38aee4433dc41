mod gcs;
mod local;

pub use gcs::GcsStore;
pub use local::LocalStore;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Not a URL of this store: {0}")]
    ForeignUrl(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Upload progress callback: `(bytes_transferred, total_bytes)`.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// A progress callback that ignores every event.
pub fn no_progress() -> ProgressFn {
    Arc::new(|_, _| {})
}

/// Abstraction over blob storage backends.
///
/// Blobs are addressed by the URL `put` returns. The store knows nothing about
/// albums or photos; that mapping lives only in the metadata database.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `path` and return its public URL. `progress` is called
    /// as bytes are transferred, ending with `(total, total)` on success.
    async fn put(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
        progress: ProgressFn,
    ) -> Result<String, ObjectStoreError>;

    async fn get_by_url(&self, url: &str) -> Result<Bytes, ObjectStoreError>;

    /// Delete the blob behind `url`. A blob that is already gone yields
    /// [`ObjectStoreError::NotFound`].
    async fn delete_by_url(&self, url: &str) -> Result<(), ObjectStoreError>;

    async fn exists_by_url(&self, url: &str) -> Result<bool, ObjectStoreError>;
}

/// Characters kept verbatim inside a single path segment
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode each `/`-separated segment of a blob path.
pub(crate) fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Percent-encode a whole object name, slashes included.
pub(crate) fn encode_object_name(name: &str) -> String {
    utf8_percent_encode(name, SEGMENT).to_string()
}

pub(crate) fn decode_path(encoded: &str) -> Result<String, ObjectStoreError> {
    percent_decode_str(encoded)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| ObjectStoreError::ForeignUrl(encoded.to_string()))
}

/// Reject blob paths that could escape the store root.
pub(crate) fn validate_path(path: &str) -> Result<(), ObjectStoreError> {
    let bad = path.is_empty()
        || path.starts_with('/')
        || path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if bad {
        return Err(ObjectStoreError::Backend(format!(
            "invalid blob path '{path}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_path_keeps_separators() {
        assert_eq!(
            encode_path("users/u 1/photos/a#b.jpg"),
            "users/u%201/photos/a%23b.jpg"
        );
        assert_eq!(decode_path("users/u%201/photos/a%23b.jpg").unwrap(), "users/u 1/photos/a#b.jpg");
    }

    #[test]
    fn test_encode_object_name_escapes_slashes() {
        assert_eq!(encode_object_name("a/b.jpg"), "a%2Fb.jpg");
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("users/u/photos/x.jpg").is_ok());
        assert!(validate_path("../etc/passwd").is_err());
        assert!(validate_path("/abs").is_err());
        assert!(validate_path("a//b").is_err());
        assert!(validate_path("").is_err());
    }
}
