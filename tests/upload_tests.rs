use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use gallery_engine::error::GalleryError;
use gallery_engine::gallery::Gallery;
use gallery_engine::object_store::{LocalStore, ObjectStore, ObjectStoreError, ProgressFn};
use gallery_engine::storage::models::MediaKind;
use gallery_engine::storage::Database;
use gallery_engine::upload::{UploadFile, UploadOrchestrator, UploadProgress, UploadTarget};
use tokio::sync::watch;

const BASE_URL: &str = "http://localhost:8080/blobs";
const MAX_UPLOAD_SIZE: u64 = 512 * 1024;

/// Local store with scripted misbehaviour: puts of `-bad.jpg` paths fail,
/// and with `fixed_url` set every put reports that same URL.
struct ScriptedStore {
    inner: LocalStore,
    fixed_url: Option<String>,
    deletes: AtomicUsize,
}

#[async_trait]
impl ObjectStore for ScriptedStore {
    async fn put(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
        progress: ProgressFn,
    ) -> Result<String, ObjectStoreError> {
        if path.ends_with("-bad.jpg") {
            return Err(ObjectStoreError::Backend("connection reset".to_string()));
        }
        let url = self.inner.put(path, data, content_type, progress).await?;
        Ok(self.fixed_url.clone().unwrap_or(url))
    }

    async fn get_by_url(&self, url: &str) -> Result<Bytes, ObjectStoreError> {
        self.inner.get_by_url(url).await
    }

    async fn delete_by_url(&self, url: &str) -> Result<(), ObjectStoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_by_url(url).await
    }

    async fn exists_by_url(&self, url: &str) -> Result<bool, ObjectStoreError> {
        self.inner.exists_by_url(url).await
    }
}

fn scripted(
    dir: &tempfile::TempDir,
    fixed_url: Option<&str>,
) -> (Gallery, UploadOrchestrator, Arc<ScriptedStore>) {
    let db = Database::open(dir.path().join("data")).unwrap();
    let store = Arc::new(ScriptedStore {
        inner: LocalStore::new(dir.path().join("files"), BASE_URL).unwrap(),
        fixed_url: fixed_url.map(str::to_string),
        deletes: AtomicUsize::new(0),
    });
    let gallery = Gallery::new(db, store.clone());
    let uploads = UploadOrchestrator::new(gallery.clone(), MAX_UPLOAD_SIZE);
    (gallery, uploads, store)
}

struct Fixture {
    _dir: tempfile::TempDir,
    gallery: Gallery,
    uploads: UploadOrchestrator,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    let store = LocalStore::new(dir.path().join("files"), BASE_URL).unwrap();
    let gallery = Gallery::new(db, Arc::new(store));
    let uploads = UploadOrchestrator::new(gallery.clone(), MAX_UPLOAD_SIZE);
    Fixture {
        _dir: dir,
        gallery,
        uploads,
    }
}

fn file(name: &str, size: usize, mime_type: &str) -> UploadFile {
    UploadFile {
        bytes: Bytes::from(vec![1u8; size]),
        file_name: name.to_string(),
        mime_type: mime_type.to_string(),
    }
}

fn new_album(name: &str) -> UploadTarget {
    UploadTarget::NewAlbum {
        name: name.to_string(),
        description: None,
    }
}

#[tokio::test]
async fn test_upload_into_new_album_bootstraps_cover() {
    let f = fixture();
    let files = vec![
        file("a.jpg", 1024, "image/jpeg"),
        file("b.jpg", 2048, "image/jpeg"),
        file("clip.mp4", 4096, ""),
    ];

    let report = f
        .uploads
        .upload(files, new_album("Summer"), "alice", None)
        .await
        .unwrap();
    assert_eq!(report.uploaded.len(), 3);
    assert!(report.failed.is_empty());

    let album = f.gallery.db().get_album(&report.album_id).unwrap().unwrap();
    assert_eq!(album.name, "Summer");
    let cover = album.cover_photo_url.expect("cover should be set");
    assert!(report.uploaded.iter().any(|p| p.url == cover));

    let clip = report
        .uploaded
        .iter()
        .find(|p| p.file_name == "clip.mp4")
        .unwrap();
    assert_eq!(clip.media_kind, MediaKind::Video);
    assert!(clip.url.starts_with(&format!(
        "{BASE_URL}/users/alice/photos/{}/",
        album.id
    )));
    assert!(clip.url.ends_with("-clip.mp4"));
    assert!(f.gallery.blobs().exists_by_url(&clip.url).await.unwrap());
}

#[tokio::test]
async fn test_upload_into_existing_album_keeps_cover() {
    let f = fixture();
    let album = f.gallery.create_album("Trip", None, "alice").unwrap();

    let report = f
        .uploads
        .upload(
            vec![file("a.jpg", 10, "image/jpeg")],
            UploadTarget::Existing {
                album_id: album.id.clone(),
            },
            "alice",
            None,
        )
        .await
        .unwrap();
    assert_eq!(report.album_id, album.id);
    assert_eq!(report.uploaded.len(), 1);

    // Only freshly created albums get a cover automatically
    let album = f.gallery.db().get_album(&album.id).unwrap().unwrap();
    assert_eq!(album.cover_photo_url, None);
}

#[tokio::test]
async fn test_same_file_name_twice_gets_distinct_blobs() {
    let f = fixture();
    let files = vec![
        file("IMG_0001.jpg", 10, "image/jpeg"),
        file("IMG_0001.jpg", 20, "image/jpeg"),
    ];

    let report = f
        .uploads
        .upload(files, new_album("Dupes"), "alice", None)
        .await
        .unwrap();
    assert_eq!(report.uploaded.len(), 2);
    assert_ne!(report.uploaded[0].url, report.uploaded[1].url);
}

#[tokio::test]
async fn test_progress_is_monotonic_and_completes() {
    let f = fixture();
    let (tx, mut rx) = watch::channel(UploadProgress::default());

    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            seen.push(rx.borrow_and_update().clone());
        }
        seen.push(rx.borrow().clone());
        seen
    });

    let files = vec![
        file("a.jpg", 300 * 1024, "image/jpeg"),
        file("b.jpg", 200 * 1024, "image/jpeg"),
        file("empty.jpg", 0, "image/jpeg"),
    ];
    let report = f
        .uploads
        .upload(files, new_album("Progress"), "alice", Some(tx))
        .await
        .unwrap();
    assert_eq!(report.uploaded.len(), 3);

    let seen = observer.await.unwrap();
    let fractions: Vec<f64> = seen.iter().map(UploadProgress::fraction).collect();
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]), "{fractions:?}");

    let last = seen.last().unwrap();
    assert!(last.is_complete());
    assert_eq!(last.fraction(), 1.0);
    assert_eq!(last.total_bytes, 500 * 1024);
    assert_eq!(last.bytes_transferred, 500 * 1024);
}

#[tokio::test]
async fn test_oversized_file_fails_alone() {
    let f = fixture();
    let files = vec![
        file("ok.jpg", 100, "image/jpeg"),
        file("huge.jpg", MAX_UPLOAD_SIZE as usize + 1, "image/jpeg"),
    ];

    let report = f
        .uploads
        .upload(files, new_album("Mixed"), "alice", None)
        .await
        .unwrap();
    assert_eq!(report.uploaded.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].file_name, "huge.jpg");
    assert!(matches!(
        report.failed[0].to_error(),
        GalleryError::Upload { .. }
    ));

    let photos = f.gallery.db().photos_in_album(&report.album_id).unwrap();
    assert_eq!(photos.len(), 1);
}

#[tokio::test]
async fn test_empty_upload_is_rejected() {
    let f = fixture();
    let result = f
        .uploads
        .upload(Vec::new(), new_album("Nothing"), "alice", None)
        .await;
    assert!(matches!(result, Err(GalleryError::Validation(_))));
    assert!(f.gallery.list_albums("alice").unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_into_foreign_album_is_rejected() {
    let f = fixture();
    let album = f.gallery.create_album("Bob's", None, "bob").unwrap();

    let result = f
        .uploads
        .upload(
            vec![file("a.jpg", 10, "image/jpeg")],
            UploadTarget::Existing {
                album_id: album.id.clone(),
            },
            "alice",
            None,
        )
        .await;
    assert!(matches!(result, Err(GalleryError::Permission(_))));
    assert!(f.gallery.db().photos_in_album(&album.id).unwrap().is_empty());

    let result = f
        .uploads
        .upload(
            vec![file("a.jpg", 10, "image/jpeg")],
            UploadTarget::Existing {
                album_id: "missing".to_string(),
            },
            "alice",
            None,
        )
        .await;
    assert!(matches!(result, Err(GalleryError::NotFound(_))));
}

#[tokio::test]
async fn test_new_album_name_must_not_be_blank() {
    let f = fixture();
    let result = f
        .uploads
        .upload(
            vec![file("a.jpg", 10, "image/jpeg")],
            new_album("  "),
            "alice",
            None,
        )
        .await;
    assert!(matches!(result, Err(GalleryError::Validation(_))));
}

#[tokio::test]
async fn test_failed_put_does_not_affect_sibling() {
    let dir = tempfile::tempdir().unwrap();
    let (gallery, uploads, store) = scripted(&dir, None);
    let files = vec![
        file("good.jpg", 100, "image/jpeg"),
        file("bad.jpg", 100, "image/jpeg"),
    ];

    let report = uploads
        .upload(files, new_album("Flaky"), "alice", None)
        .await
        .unwrap();
    assert_eq!(report.uploaded.len(), 1);
    assert_eq!(report.uploaded[0].file_name, "good.jpg");
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].file_name, "bad.jpg");
    assert!(report.failed[0].message.contains("connection reset"));

    let photos = gallery.db().photos_in_album(&report.album_id).unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(store.deletes.load(Ordering::SeqCst), 0);

    let album = gallery.db().get_album(&report.album_id).unwrap().unwrap();
    assert_eq!(album.cover_photo_url, Some(photos[0].url.clone()));
}

#[tokio::test]
async fn test_unrecorded_blob_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    let shared = format!("{BASE_URL}/users/alice/shared.jpg");
    let (gallery, uploads, store) = scripted(&dir, Some(&shared));
    let files = vec![
        file("one.jpg", 10, "image/jpeg"),
        file("two.jpg", 10, "image/jpeg"),
    ];

    // Both puts report the same URL, so only one record can claim it
    let report = uploads
        .upload(files, new_album("Clash"), "alice", None)
        .await
        .unwrap();
    assert_eq!(report.uploaded.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(store.deletes.load(Ordering::SeqCst), 1);

    let photos = gallery.db().photos_in_album(&report.album_id).unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].url, shared);
}
