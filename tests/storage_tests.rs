use std::time::Duration;

use gallery_engine::storage::models::{AlbumUpdate, MediaKind, NewPhoto, Patch, PhotoSort};
use gallery_engine::storage::{AlbumDocument, AlbumQuery, Batch, Database, DatabaseError, PhotoQuery};
use tokio::sync::mpsc;

fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    (dir, db)
}

fn new_photo(album_id: &str, owner_id: &str, name: &str) -> NewPhoto {
    NewPhoto {
        album_id: album_id.to_string(),
        owner_id: owner_id.to_string(),
        url: format!("https://store/{album_id}/{name}"),
        file_name: name.to_string(),
        media_kind: MediaKind::Image,
    }
}

async fn next_snapshot<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for snapshot")
        .expect("subscription ended")
}

// ============================================================================
// Albums
// ============================================================================

#[test]
fn test_add_and_get_album() {
    let (_dir, db) = test_db();
    let album = db.add_album("Summer", Some("Beach days"), "alice").unwrap();

    let retrieved = db.get_album(&album.id).unwrap().expect("album should exist");
    assert_eq!(retrieved, album);
    assert!(!retrieved.is_public);
    assert_eq!(retrieved.cover_photo_url, None);
    assert_eq!(retrieved.description.as_deref(), Some("Beach days"));
}

#[test]
fn test_albums_by_owner_newest_first() {
    let (_dir, db) = test_db();
    let first = db.add_album("First", None, "alice").unwrap();
    let second = db.add_album("Second", None, "alice").unwrap();
    db.add_album("Other", None, "bob").unwrap();

    let albums = db.albums_by_owner("alice").unwrap();
    let ids: Vec<&str> = albums.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
}

#[test]
fn test_update_album_patch_semantics() {
    let (_dir, db) = test_db();
    let album = db.add_album("Trip", Some("old"), "alice").unwrap();

    let update = AlbumUpdate {
        name: Some("Road trip".to_string()),
        description: Patch::Null,
        ..Default::default()
    };
    let updated = db.update_album(&album.id, "alice", &update).unwrap();
    assert_eq!(updated.name, "Road trip");
    assert_eq!(updated.description, None);
    assert_eq!(updated.created_at, album.created_at);
}

#[test]
fn test_update_album_rejects_other_owner() {
    let (_dir, db) = test_db();
    let album = db.add_album("Trip", None, "alice").unwrap();

    let result = db.update_album(&album.id, "mallory", &AlbumUpdate::visibility(true));
    assert!(matches!(result, Err(DatabaseError::PermissionDenied(_))));
    assert!(!db.get_album(&album.id).unwrap().unwrap().is_public);
}

#[test]
fn test_set_cover_if_unset_only_once() {
    let (_dir, db) = test_db();
    let album = db.add_album("Trip", None, "alice").unwrap();

    assert!(db.set_cover_if_unset(&album.id, "alice", "https://store/a.jpg").unwrap());
    assert!(!db.set_cover_if_unset(&album.id, "alice", "https://store/b.jpg").unwrap());

    let album = db.get_album(&album.id).unwrap().unwrap();
    assert_eq!(album.cover_photo_url.as_deref(), Some("https://store/a.jpg"));
}

#[test]
fn test_public_album_read_model() {
    let (_dir, db) = test_db();
    let album = db.add_album("Trip", None, "alice").unwrap();
    db.add_photo(new_photo(&album.id, "alice", "a.jpg")).unwrap();
    db.add_photo(new_photo(&album.id, "alice", "b.jpg")).unwrap();

    assert!(matches!(
        db.get_public_album(&album.id),
        Err(DatabaseError::PermissionDenied(_))
    ));
    assert!(matches!(
        db.get_public_album("missing"),
        Err(DatabaseError::NotFound(_))
    ));

    db.update_album(&album.id, "alice", &AlbumUpdate::visibility(true))
        .unwrap();
    let (public, photos) = db.get_public_album(&album.id).unwrap();
    assert_eq!(public.id, album.id);
    let names: Vec<&str> = photos.iter().map(|p| p.file_name.as_str()).collect();
    assert_eq!(names, vec!["b.jpg", "a.jpg"]);
}

#[test]
fn test_sort_preference_round_trip() {
    let (_dir, db) = test_db();
    let album = db.add_album("Trip", None, "alice").unwrap();

    assert_eq!(db.get_sort_preference(&album.id).unwrap(), None);
    db.set_sort_preference(&album.id, "alice", PhotoSort::FileName)
        .unwrap();
    assert_eq!(
        db.get_sort_preference(&album.id).unwrap(),
        Some(PhotoSort::FileName)
    );

    let result = db.set_sort_preference(&album.id, "bob", PhotoSort::OldestFirst);
    assert!(matches!(result, Err(DatabaseError::PermissionDenied(_))));
}

// ============================================================================
// Photos
// ============================================================================

#[test]
fn test_add_photo_requires_album_and_owner() {
    let (_dir, db) = test_db();
    let album = db.add_album("Trip", None, "alice").unwrap();

    assert!(matches!(
        db.add_photo(new_photo("missing", "alice", "a.jpg")),
        Err(DatabaseError::NotFound(_))
    ));
    assert!(matches!(
        db.add_photo(new_photo(&album.id, "bob", "a.jpg")),
        Err(DatabaseError::PermissionDenied(_))
    ));
}

#[test]
fn test_photo_url_is_unique() {
    let (_dir, db) = test_db();
    let album = db.add_album("Trip", None, "alice").unwrap();
    db.add_photo(new_photo(&album.id, "alice", "a.jpg")).unwrap();

    let result = db.add_photo(new_photo(&album.id, "alice", "a.jpg"));
    assert!(matches!(result, Err(DatabaseError::Conflict(_))));
    assert_eq!(db.photos_in_album(&album.id).unwrap().len(), 1);
}

#[test]
fn test_get_photo_by_url() {
    let (_dir, db) = test_db();
    let album = db.add_album("Trip", None, "alice").unwrap();
    let photo = db.add_photo(new_photo(&album.id, "alice", "a.jpg")).unwrap();

    let found = db.get_photo_by_url(&photo.url).unwrap().unwrap();
    assert_eq!(found.id, photo.id);
    assert!(db.get_photo_by_url("https://store/none").unwrap().is_none());
}

#[test]
fn test_created_at_strictly_increasing() {
    let (_dir, db) = test_db();
    let album = db.add_album("Burst", None, "alice").unwrap();

    let photos: Vec<_> = (0..50)
        .map(|i| {
            db.add_photo(new_photo(&album.id, "alice", &format!("{i}.jpg")))
                .unwrap()
        })
        .collect();

    assert!(photos
        .windows(2)
        .all(|w| w[0].created_at < w[1].created_at));
}

#[test]
fn test_query_photos_filters_orders_limits() {
    let (_dir, db) = test_db();
    let album = db.add_album("Trip", None, "alice").unwrap();
    let other = db.add_album("Other", None, "alice").unwrap();
    let a = db.add_photo(new_photo(&album.id, "alice", "c.jpg")).unwrap();
    let b = db.add_photo(new_photo(&album.id, "alice", "a.jpg")).unwrap();
    let c = db.add_photo(new_photo(&album.id, "alice", "b.jpg")).unwrap();
    db.add_photo(new_photo(&other.id, "alice", "z.jpg")).unwrap();

    let newest = db
        .query_photos(&PhotoQuery::newest_in_album(&album.id))
        .unwrap();
    assert_eq!(newest.len(), 1);
    assert_eq!(newest[0].id, c.id);

    let by_name = db
        .query_photos(&PhotoQuery::in_album(&album.id).order_by(PhotoSort::FileName))
        .unwrap();
    let names: Vec<&str> = by_name.iter().map(|p| p.file_name.as_str()).collect();
    assert_eq!(names, vec!["a.jpg", "b.jpg", "c.jpg"]);

    let after_first = db
        .query_photos(
            &PhotoQuery::in_album(&album.id)
                .created_after(a.created_at)
                .order_by(PhotoSort::OldestFirst),
        )
        .unwrap();
    let ids: Vec<&str> = after_first.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec![b.id.as_str(), c.id.as_str()]);

    let everything = db.query_photos(&PhotoQuery::default()).unwrap();
    assert_eq!(everything.len(), 4);
}

#[test]
fn test_delete_photo_is_idempotent() {
    let (_dir, db) = test_db();
    let album = db.add_album("Trip", None, "alice").unwrap();
    let photo = db.add_photo(new_photo(&album.id, "alice", "a.jpg")).unwrap();

    assert!(db.delete_photo(&photo.id, "alice").unwrap());
    assert!(!db.delete_photo(&photo.id, "alice").unwrap());
    assert!(db.get_photo_by_url(&photo.url).unwrap().is_none());
    assert!(db.photos_in_album(&album.id).unwrap().is_empty());
}

// ============================================================================
// Batches
// ============================================================================

#[test]
fn test_batch_commits_everything() {
    let (_dir, db) = test_db();
    let album = db.add_album("Trip", None, "alice").unwrap();
    let a = db.add_photo(new_photo(&album.id, "alice", "a.jpg")).unwrap();
    let b = db.add_photo(new_photo(&album.id, "alice", "b.jpg")).unwrap();

    let mut batch = Batch::new();
    batch
        .delete_photo(a.id.clone())
        .delete_photo("ghost")
        .update_album(album.id.clone(), AlbumUpdate::cover(Some(b.url.clone())));
    let outcome = db.commit_batch("alice", batch).unwrap();

    assert_eq!(outcome.deleted_photos.len(), 1);
    assert_eq!(outcome.missing, vec!["ghost".to_string()]);
    assert_eq!(
        outcome.updated_albums[0].cover_photo_url.as_deref(),
        Some(b.url.as_str())
    );
    assert!(db.get_photo(&a.id).unwrap().is_none());
}

#[test]
fn test_batch_aborts_on_permission_failure() {
    let (_dir, db) = test_db();
    let mine = db.add_album("Mine", None, "alice").unwrap();
    let theirs = db.add_album("Theirs", None, "bob").unwrap();
    let a = db.add_photo(new_photo(&mine.id, "alice", "a.jpg")).unwrap();
    let b = db.add_photo(new_photo(&theirs.id, "bob", "b.jpg")).unwrap();

    let mut batch = Batch::new();
    batch.delete_photo(a.id.clone()).delete_photo(b.id.clone());
    let result = db.commit_batch("alice", batch);

    assert!(matches!(result, Err(DatabaseError::PermissionDenied(_))));
    // Nothing from the batch landed
    assert!(db.get_photo(&a.id).unwrap().is_some());
    assert!(db.get_photo(&b.id).unwrap().is_some());
}

#[test]
fn test_batch_album_delete_cascades() {
    let (_dir, db) = test_db();
    let album = db.add_album("Trip", None, "alice").unwrap();
    db.add_photo(new_photo(&album.id, "alice", "a.jpg")).unwrap();
    db.add_photo(new_photo(&album.id, "alice", "b.jpg")).unwrap();
    db.set_sort_preference(&album.id, "alice", PhotoSort::FileName)
        .unwrap();

    let mut batch = Batch::new();
    batch.delete_album(album.id.clone());
    let outcome = db.commit_batch("alice", batch).unwrap();

    assert_eq!(outcome.deleted_albums.len(), 1);
    assert_eq!(outcome.deleted_photos.len(), 2);
    assert!(db.get_album(&album.id).unwrap().is_none());
    assert!(db.get_all_photos().unwrap().is_empty());
    assert!(db.albums_by_owner("alice").unwrap().is_empty());
    assert_eq!(db.get_sort_preference(&album.id).unwrap(), None);
}

#[test]
fn test_purge_all() {
    let (_dir, db) = test_db();
    let album = db.add_album("Trip", None, "alice").unwrap();
    let photo = db.add_photo(new_photo(&album.id, "alice", "a.jpg")).unwrap();

    let stats = db.purge_all().unwrap();
    assert_eq!(stats.albums, 1);
    assert_eq!(stats.photos, 1);
    assert!(db.get_all_photos().unwrap().is_empty());

    // The URL index is cleared too, so the same URL can be reused
    let album = db.add_album("Again", None, "alice").unwrap();
    let reused = NewPhoto {
        url: photo.url.clone(),
        ..new_photo(&album.id, "alice", "a.jpg")
    };
    assert!(db.add_photo(reused).is_ok());
}

// ============================================================================
// Live queries
// ============================================================================

#[tokio::test]
async fn test_subscription_pushes_full_snapshots() {
    let (_dir, db) = test_db();
    let album = db.add_album("Trip", None, "alice").unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = db.subscribe(
        PhotoQuery::in_album(&album.id).order_by(PhotoSort::OldestFirst),
        move |snapshot| {
            let _ = tx.send(snapshot);
        },
        |_| {},
    );

    assert!(next_snapshot(&mut rx).await.is_empty());

    let a = db.add_photo(new_photo(&album.id, "alice", "a.jpg")).unwrap();
    let snapshot = next_snapshot(&mut rx).await;
    assert_eq!(snapshot.len(), 1);

    let b = db.add_photo(new_photo(&album.id, "alice", "b.jpg")).unwrap();
    let snapshot = next_snapshot(&mut rx).await;
    let ids: Vec<&str> = snapshot.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec![a.id.as_str(), b.id.as_str()]);

    assert!(subscription.is_active());
    subscription.unsubscribe();
}

#[tokio::test]
async fn test_subscription_skips_unchanged_results() {
    let (_dir, db) = test_db();
    let album = db.add_album("Trip", None, "alice").unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _subscription = db.subscribe(
        AlbumDocument {
            album_id: album.id.clone(),
        },
        move |snapshot| {
            let _ = tx.send(snapshot);
        },
        |_| {},
    );
    assert_eq!(next_snapshot(&mut rx).await.len(), 1);

    // A commit that does not touch this album produces no snapshot
    db.add_album("Unrelated", None, "bob").unwrap();
    db.update_album(&album.id, "alice", &AlbumUpdate::visibility(true))
        .unwrap();

    let snapshot = next_snapshot(&mut rx).await;
    assert!(snapshot[0].is_public);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_dropped_subscription_stops_delivering() {
    let (_dir, db) = test_db();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = db.subscribe(
        AlbumQuery::owned_by("alice"),
        move |snapshot| {
            let _ = tx.send(snapshot);
        },
        |_| {},
    );
    assert!(next_snapshot(&mut rx).await.is_empty());

    drop(subscription);
    db.add_album("Later", None, "alice").unwrap();

    // The callback (and with it the sender) is gone once the task is aborted
    let closed = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("channel should close");
    assert!(closed.is_none());
}
