//! Save/share fallback chain for the photo on screen.
//!
//! 1. Fetch the bytes and hand them to the platform's native share.
//! 2. Fetched but no share (unsupported or failed): download under the original name.
//! 3. Nothing fetched (usually a cross-origin block) or the download failed:
//!    open the original URL externally and show a notice.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::storage::models::Photo;

/// Shown after falling back to opening the original externally
pub const SAVE_INSTRUCTIONS: &str =
    "The photo opened in a new tab. Use your browser's save option to keep a copy.";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Unexpected HTTP status {0}")]
    Status(u16),
    /// Returned by fetchers running under a browser origin policy, when the
    /// blob host does not allow the cross-origin read. The save chain then
    /// falls back to opening the original.
    #[error("Blocked by cross-origin policy")]
    CrossOrigin,
}

/// Retrieves media bytes by URL.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

#[derive(Debug, Clone)]
pub struct SharedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("Cancelled by the user")]
    Cancelled,
    #[error("{0}")]
    Failed(String),
}

/// Host capabilities used by the save chain.
#[async_trait]
pub trait SharePlatform: Send + Sync {
    fn can_share_files(&self, file: &SharedFile) -> bool;

    async fn share_file(&self, file: &SharedFile) -> Result<(), ShareError>;

    async fn download(&self, file: &SharedFile) -> Result<(), ShareError>;

    /// Open `url` in a new browsing context.
    async fn open_external(&self, url: &str) -> Result<(), ShareError>;

    /// Non-blocking notice to the user.
    fn notify(&self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Shared,
    Downloaded,
    OpenedExternally,
    /// The user dismissed the share sheet
    Cancelled,
    Failed(String),
}

/// Run the fallback chain for `photo`.
pub async fn save_or_share(
    photo: &Photo,
    fetcher: &dyn MediaFetcher,
    platform: &dyn SharePlatform,
) -> SaveOutcome {
    match fetcher.fetch(&photo.url).await {
        Ok(bytes) => {
            let file = SharedFile {
                file_name: photo.file_name.clone(),
                mime_type: mime_guess::from_path(&photo.file_name)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string(),
                bytes,
            };

            if platform.can_share_files(&file) {
                match platform.share_file(&file).await {
                    Ok(()) => return SaveOutcome::Shared,
                    Err(ShareError::Cancelled) => return SaveOutcome::Cancelled,
                    Err(e) => {
                        tracing::warn!(file_name = %file.file_name, error = %e, "Native share failed, downloading instead");
                    }
                }
            }

            match platform.download(&file).await {
                Ok(()) => return SaveOutcome::Downloaded,
                Err(e) => {
                    tracing::warn!(file_name = %file.file_name, error = %e, "Download failed, opening original");
                }
            }
        }
        Err(e) => {
            tracing::warn!(url = %photo.url, error = %e, "Could not fetch media, opening original");
        }
    }

    match platform.open_external(&photo.url).await {
        Ok(()) => {
            platform.notify(SAVE_INSTRUCTIONS);
            SaveOutcome::OpenedExternally
        }
        Err(e) => SaveOutcome::Failed(e.to_string()),
    }
}

// ============================================================================
// Implementations
// ============================================================================

/// Fetches media over HTTP.
#[derive(Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status().as_u16()));
        }

        resp.bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))
    }
}

/// Headless platform: no native share, downloads land in a directory,
/// external opens and notices go to the log.
pub struct DownloadDirPlatform {
    dir: PathBuf,
}

impl DownloadDirPlatform {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Create a fresh file for `file_name`, numbered when the name is taken.
    /// Creation is exclusive, so concurrent downloads never share a file.
    async fn create_target(&self, file_name: &str) -> std::io::Result<(PathBuf, tokio::fs::File)> {
        let name = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("download");
        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
            _ => (name, String::new()),
        };

        let mut n = 0u32;
        loop {
            let candidate = if n == 0 {
                self.dir.join(name)
            } else {
                self.dir.join(format!("{stem} ({n}){ext}"))
            };
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
                .await
            {
                Ok(file) => return Ok((candidate, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl SharePlatform for DownloadDirPlatform {
    fn can_share_files(&self, _file: &SharedFile) -> bool {
        false
    }

    async fn share_file(&self, _file: &SharedFile) -> Result<(), ShareError> {
        Err(ShareError::Failed("native share is not available".to_string()))
    }

    async fn download(&self, file: &SharedFile) -> Result<(), ShareError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ShareError::Failed(e.to_string()))?;
        let (target, mut out) = self
            .create_target(&file.file_name)
            .await
            .map_err(|e| ShareError::Failed(e.to_string()))?;
        out.write_all(&file.bytes)
            .await
            .map_err(|e| ShareError::Failed(e.to_string()))?;
        out.flush()
            .await
            .map_err(|e| ShareError::Failed(e.to_string()))?;
        tracing::info!(path = %target.display(), "Saved download");
        Ok(())
    }

    async fn open_external(&self, url: &str) -> Result<(), ShareError> {
        tracing::info!(%url, "Open in new browsing context");
        Ok(())
    }

    fn notify(&self, message: &str) {
        tracing::info!(%message, "User notice");
    }
}
