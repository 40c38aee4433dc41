use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::{decode_path, encode_path, validate_path, ObjectStore, ObjectStoreError, ProgressFn};
use crate::thumbnail::{thumbnail_url_with_size, ThumbnailSize};

/// Bytes written between progress events
const WRITE_CHUNK: usize = 64 * 1024;

/// Local filesystem object store. Blobs are served back by the HTTP API under
/// `base_url`, so the URL returned by `put` is `<base_url>/<encoded path>`.
pub struct LocalStore {
    base_path: PathBuf,
    base_url: String,
    rendition: Option<ThumbnailSize>,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P, base_url: &str) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            base_url: base_url.trim_end_matches('/').to_string(),
            rendition: None,
        })
    }

    /// Derive a `_<size>` rendition next to every stored image.
    pub fn with_renditions(mut self, size: ThumbnailSize) -> Self {
        self.rendition = Some(size);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn object_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, encode_path(path))
    }

    /// Map a URL issued by this store back to its blob path.
    fn path_from_url(&self, url: &str) -> Result<String, ObjectStoreError> {
        let without_query = url.split('?').next().unwrap_or(url);
        let encoded = without_query
            .strip_prefix(&self.base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| ObjectStoreError::ForeignUrl(url.to_string()))?;
        let path = decode_path(encoded)?;
        validate_path(&path)?;
        Ok(path)
    }

    async fn write_rendition(&self, path: &str, data: Bytes) {
        let Some(size) = self.rendition else {
            return;
        };
        let rendition_path = thumbnail_url_with_size(path, size);
        if rendition_path == path {
            // Videos and extension-less blobs get no rendition
            return;
        }

        let output = self.object_path(&rendition_path);
        let result = tokio::task::spawn_blocking(move || -> Result<(), image::ImageError> {
            let img = image::load_from_memory(&data)?;
            img.thumbnail(size.width, size.height).save(&output)?;
            Ok(())
        })
        .await;

        match result {
            Ok(Ok(())) => tracing::debug!(path = %rendition_path, "Derived rendition"),
            Ok(Err(e)) => {
                tracing::warn!(path = %path, error = %e, "Could not derive rendition")
            }
            Err(e) => tracing::warn!(path = %path, error = %e, "Rendition task failed"),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(
        &self,
        path: &str,
        data: Bytes,
        _content_type: &str,
        progress: ProgressFn,
    ) -> Result<String, ObjectStoreError> {
        validate_path(path)?;
        let target = self.object_path(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let total = data.len() as u64;
        let mut file = tokio::fs::File::create(&target).await?;
        let mut written = 0u64;
        progress(0, total);
        for chunk in data.chunks(WRITE_CHUNK) {
            file.write_all(chunk).await?;
            written += chunk.len() as u64;
            progress(written, total);
        }
        file.flush().await?;

        self.write_rendition(path, data).await;
        Ok(self.url_for(path))
    }

    async fn get_by_url(&self, url: &str) -> Result<Bytes, ObjectStoreError> {
        let path = self.object_path(&self.path_from_url(url)?);
        if !path.exists() {
            return Err(ObjectStoreError::NotFound(url.to_string()));
        }
        let data = tokio::fs::read(&path).await?;
        Ok(Bytes::from(data))
    }

    async fn delete_by_url(&self, url: &str) -> Result<(), ObjectStoreError> {
        let blob_path = self.path_from_url(url)?;
        let path = self.object_path(&blob_path);
        if !path.exists() {
            return Err(ObjectStoreError::NotFound(url.to_string()));
        }
        tokio::fs::remove_file(&path).await?;

        if let Some(size) = self.rendition {
            let rendition_path = thumbnail_url_with_size(&blob_path, size);
            if rendition_path != blob_path {
                let rendition = self.object_path(&rendition_path);
                if rendition.exists() {
                    if let Err(e) = tokio::fs::remove_file(&rendition).await {
                        tracing::warn!(path = %rendition_path, error = %e, "Failed to delete rendition");
                    }
                }
            }
        }
        Ok(())
    }

    async fn exists_by_url(&self, url: &str) -> Result<bool, ObjectStoreError> {
        let path = self.object_path(&self.path_from_url(url)?);
        Ok(path.exists())
    }
}
