//! Concurrent multi-file upload with per-file and aggregate progress.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;

use crate::error::{GalleryError, Result};
use crate::gallery::Gallery;
use crate::object_store::ProgressFn;
use crate::storage::models::{Album, MediaKind, NewPhoto, Photo};

/// One file handed over by the upload source.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub bytes: Bytes,
    pub file_name: String,
    /// May be empty when the source could not tell
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub enum UploadTarget {
    Existing {
        album_id: String,
    },
    NewAlbum {
        name: String,
        description: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileProgress {
    pub file_name: String,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    pub done: bool,
}

/// Progress of one upload invocation, as published on the watch channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadProgress {
    pub files: Vec<FileProgress>,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    /// Aggregate fraction in `0.0..=1.0`, by bytes. It is `1.0` only once
    /// every file is done, so empty files still pending hold it below.
    pub fn fraction(&self) -> f64 {
        if self.is_complete() {
            return 1.0;
        }
        if self.total_bytes == 0 {
            return 0.0;
        }
        let ratio = self.bytes_transferred as f64 / self.total_bytes as f64;
        ratio.min(1.0 - f64::EPSILON)
    }

    pub fn is_complete(&self) -> bool {
        !self.files.is_empty() && self.files.iter().all(|f| f.done)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadFailure {
    pub file_name: String,
    pub message: String,
}

impl UploadFailure {
    pub fn to_error(&self) -> GalleryError {
        GalleryError::Upload {
            file_name: self.file_name.clone(),
            reason: self.message.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub album_id: String,
    pub uploaded: Vec<Photo>,
    pub failed: Vec<UploadFailure>,
}

/// Fans one upload invocation out over the blob store and records each
/// stored file in the metadata database.
#[derive(Clone)]
pub struct UploadOrchestrator {
    gallery: Gallery,
    max_upload_size: u64,
    last_stamp_millis: Arc<AtomicI64>,
}

impl UploadOrchestrator {
    pub fn new(gallery: Gallery, max_upload_size: u64) -> Self {
        Self {
            gallery,
            max_upload_size,
            last_stamp_millis: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Upload every file concurrently into `target`.
    ///
    /// Creating a new album is all-or-nothing for the call. After that, files
    /// succeed or fail on their own and the report lists both. When `progress`
    /// is given, aggregate progress is published on it and never decreases.
    pub async fn upload(
        &self,
        files: Vec<UploadFile>,
        target: UploadTarget,
        owner_id: &str,
        progress: Option<watch::Sender<UploadProgress>>,
    ) -> Result<UploadReport> {
        if files.is_empty() {
            return Err(GalleryError::Validation("no files to upload".to_string()));
        }

        let (album, fresh) = self.resolve_target(target, owner_id)?;
        let tracker = Arc::new(ProgressTracker::new(&files, progress));

        let outcomes = join_all(files.into_iter().enumerate().map(|(index, file)| {
            self.upload_one(index, file, &album, owner_id, fresh, Arc::clone(&tracker))
        }))
        .await;

        let mut report = UploadReport {
            album_id: album.id.clone(),
            uploaded: Vec::new(),
            failed: Vec::new(),
        };
        for outcome in outcomes {
            match outcome {
                Ok(photo) => report.uploaded.push(photo),
                Err(failure) => report.failed.push(failure),
            }
        }

        tracing::info!(
            album_id = %album.id,
            uploaded = report.uploaded.len(),
            failed = report.failed.len(),
            "Upload finished"
        );
        Ok(report)
    }

    fn resolve_target(&self, target: UploadTarget, owner_id: &str) -> Result<(Album, bool)> {
        match target {
            UploadTarget::Existing { album_id } => {
                let album = self
                    .gallery
                    .db()
                    .get_album(&album_id)?
                    .ok_or_else(|| GalleryError::NotFound(format!("album {album_id}")))?;
                if album.owner_id != owner_id {
                    return Err(GalleryError::Permission(format!(
                        "album {album_id} is not owned by {owner_id}"
                    )));
                }
                Ok((album, false))
            }
            UploadTarget::NewAlbum { name, description } => {
                let album = self
                    .gallery
                    .create_album(&name, description.as_deref(), owner_id)?;
                Ok((album, true))
            }
        }
    }

    async fn upload_one(
        &self,
        index: usize,
        file: UploadFile,
        album: &Album,
        owner_id: &str,
        fresh_album: bool,
        tracker: Arc<ProgressTracker>,
    ) -> std::result::Result<Photo, UploadFailure> {
        let fail = |message: String| {
            tracing::warn!(file_name = %file.file_name, %message, "Upload failed");
            UploadFailure {
                file_name: file.file_name.clone(),
                message,
            }
        };

        let size = file.bytes.len() as u64;
        if size > self.max_upload_size {
            return Err(fail(format!(
                "file is {size} bytes, the limit is {} bytes",
                self.max_upload_size
            )));
        }

        let mime_type = resolve_mime(&file.mime_type, &file.file_name);
        let path = blob_path(owner_id, &album.id, &file.file_name, self.next_stamp());

        let url = self
            .gallery
            .blobs()
            .put(&path, file.bytes.clone(), &mime_type, tracker.callback(index))
            .await
            .map_err(|e| fail(e.to_string()))?;
        tracker.record(index, size);

        let new_photo = NewPhoto {
            album_id: album.id.clone(),
            owner_id: owner_id.to_string(),
            url: url.clone(),
            file_name: file.file_name.clone(),
            media_kind: MediaKind::from_mime(&mime_type),
        };
        let photo = match self.gallery.db().add_photo(new_photo) {
            Ok(photo) => photo,
            Err(e) => {
                // No record will ever point at this blob
                if let Err(cleanup) = self.gallery.blobs().delete_by_url(&url).await {
                    tracing::warn!(%url, error = %cleanup, "Failed to remove unrecorded blob");
                }
                return Err(fail(e.to_string()));
            }
        };

        if fresh_album {
            if let Err(e) = self.gallery.bootstrap_cover(&album.id, owner_id, &photo.url) {
                tracing::warn!(album_id = %album.id, error = %e, "Failed to bootstrap cover");
            }
        }

        tracing::debug!(photo_id = %photo.id, %url, "Uploaded file");
        Ok(photo)
    }

    /// Millisecond stamp for blob paths, strictly increasing so two files with
    /// the same name never share a path.
    fn next_stamp(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let previous = match self.last_stamp_millis.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |last| Some(now.max(last + 1)),
        ) {
            Ok(prev) | Err(prev) => prev,
        };
        now.max(previous + 1)
    }
}

/// Serializes progress updates through the watch channel's lock. Per-file
/// values only move forward, so the aggregate never goes backwards.
struct ProgressTracker {
    sender: watch::Sender<UploadProgress>,
}

impl ProgressTracker {
    fn new(files: &[UploadFile], sender: Option<watch::Sender<UploadProgress>>) -> Self {
        let initial = UploadProgress {
            files: files
                .iter()
                .map(|f| FileProgress {
                    file_name: f.file_name.clone(),
                    bytes_transferred: 0,
                    total_bytes: f.bytes.len() as u64,
                    done: false,
                })
                .collect(),
            bytes_transferred: 0,
            total_bytes: files.iter().map(|f| f.bytes.len() as u64).sum(),
        };

        // Without a caller channel, updates still land in a private one
        let sender = sender.unwrap_or_else(|| watch::channel(UploadProgress::default()).0);
        sender.send_replace(initial);
        Self { sender }
    }

    fn callback(self: &Arc<Self>, index: usize) -> ProgressFn {
        let tracker = Arc::clone(self);
        Arc::new(move |transferred, _total| tracker.record(index, transferred))
    }

    fn record(&self, index: usize, transferred: u64) {
        self.sender.send_if_modified(|progress| {
            let Some(file) = progress.files.get_mut(index) else {
                return false;
            };
            let clamped = transferred.min(file.total_bytes);
            let done = clamped >= file.total_bytes;
            if clamped <= file.bytes_transferred && done == file.done {
                return false;
            }

            let advanced = clamped.saturating_sub(file.bytes_transferred);
            file.bytes_transferred = file.bytes_transferred.max(clamped);
            file.done |= done;
            progress.bytes_transferred += advanced;
            true
        });
    }
}

/// `users/<owner>/photos/<album>/<stamp>-<name>`
fn blob_path(owner_id: &str, album_id: &str, file_name: &str, stamp_millis: i64) -> String {
    format!(
        "users/{}/photos/{}/{stamp_millis}-{}",
        sanitize(owner_id),
        sanitize(album_id),
        sanitize(file_name)
    )
}

/// Keep `[A-Za-z0-9._-]`, replace everything else with `_`.
fn sanitize(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "file".to_string(),
        _ => cleaned,
    }
}

fn resolve_mime(declared: &str, file_name: &str) -> String {
    let declared = declared.trim();
    if declared.is_empty() || declared.eq_ignore_ascii_case("application/octet-stream") {
        return mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
    }
    declared.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("My Photo (1).jpg"), "My_Photo__1_.jpg");
        assert_eq!(sanitize("ok-name_2.png"), "ok-name_2.png");
        assert_eq!(sanitize("été.jpg"), "_t_.jpg");
        assert_eq!(sanitize(".."), "file");
        assert_eq!(sanitize(""), "file");
    }

    #[test]
    fn test_blob_path_layout() {
        assert_eq!(
            blob_path("alice", "album-1", "a b.jpg", 1700000000000),
            "users/alice/photos/album-1/1700000000000-a_b.jpg"
        );
    }

    #[test]
    fn test_resolve_mime_falls_back_to_extension() {
        assert_eq!(resolve_mime("", "clip.mp4"), "video/mp4");
        assert_eq!(resolve_mime("application/octet-stream", "x.png"), "image/png");
        assert_eq!(resolve_mime("image/heic", "x.bin"), "image/heic");
        assert_eq!(resolve_mime("", "noext"), "application/octet-stream");
    }

    #[test]
    fn test_fraction_of_empty_files() {
        let mut progress = UploadProgress {
            files: vec![FileProgress {
                file_name: "empty.txt".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(progress.fraction(), 0.0);
        progress.files[0].done = true;
        assert_eq!(progress.fraction(), 1.0);
    }

    #[test]
    fn test_tracker_clamps_and_never_regresses() {
        let files = vec![
            UploadFile {
                bytes: Bytes::from(vec![0u8; 100]),
                file_name: "a.jpg".into(),
                mime_type: "image/jpeg".into(),
            },
            UploadFile {
                bytes: Bytes::from(vec![0u8; 300]),
                file_name: "b.jpg".into(),
                mime_type: "image/jpeg".into(),
            },
        ];
        let (tx, rx) = watch::channel(UploadProgress::default());
        let tracker = ProgressTracker::new(&files, Some(tx));

        tracker.record(1, 150);
        tracker.record(1, 50);
        assert_eq!(rx.borrow().bytes_transferred, 150);

        tracker.record(0, 1_000);
        assert_eq!(rx.borrow().bytes_transferred, 250);
        assert!(rx.borrow().files[0].done);
        assert!(!rx.borrow().is_complete());

        tracker.record(1, 300);
        assert!(rx.borrow().is_complete());
        assert_eq!(rx.borrow().fraction(), 1.0);
    }

    #[test]
    fn test_pending_empty_file_holds_fraction_below_one() {
        let files = vec![
            UploadFile {
                bytes: Bytes::new(),
                file_name: "empty.jpg".into(),
                mime_type: "image/jpeg".into(),
            },
            UploadFile {
                bytes: Bytes::from(vec![0u8; 100]),
                file_name: "b.jpg".into(),
                mime_type: "image/jpeg".into(),
            },
        ];
        let (tx, rx) = watch::channel(UploadProgress::default());
        let tracker = ProgressTracker::new(&files, Some(tx));

        tracker.record(1, 100);
        assert!(!rx.borrow().is_complete());
        assert!(rx.borrow().fraction() < 1.0);
        assert!(rx.borrow().fraction() > 0.99);

        tracker.record(0, 0);
        assert!(rx.borrow().is_complete());
        assert_eq!(rx.borrow().fraction(), 1.0);
    }
}
