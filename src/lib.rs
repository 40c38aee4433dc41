//! gallery-engine - Keeps photo albums consistent across a metadata database and
//! a blob store, and delivers their media to viewers.
//!
//! This crate provides:
//! - redb embedded database for album/photo metadata with atomic batches and live queries
//! - Swappable object storage backends (local filesystem, GCS) addressed by URL
//! - Cascade deletion and cover-photo maintenance across both stores
//! - Concurrent uploads with aggregate progress, public sharing links and embeds
//! - A lightbox engine with progressive loading, prefetch and a save/share fallback chain
//! - REST API with multipart upload support

pub mod api;
pub mod config;
pub mod error;
pub mod gallery;
pub mod object_store;
pub mod sharing;
pub mod state_machine;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod thumbnail;
pub mod upload;
pub mod viewer;

use std::sync::Arc;

use config::Config;
use gallery::Gallery;
use object_store::ObjectStore;
use sharing::SharingController;
use storage::Database;
use upload::UploadOrchestrator;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub object_store: Arc<dyn ObjectStore>,
    pub gallery: Gallery,
    pub sharing: SharingController,
    pub uploads: UploadOrchestrator,
}

impl AppState {
    pub fn new(config: Config, db: Database, object_store: Arc<dyn ObjectStore>) -> Self {
        let gallery = Gallery::new(db.clone(), Arc::clone(&object_store));
        let sharing = SharingController::new(
            db.clone(),
            &config.sharing.public_origin,
            &config.sharing.public_route_prefix,
        );
        let uploads = UploadOrchestrator::new(gallery.clone(), config.max_upload_size);

        Self {
            config,
            db,
            object_store,
            gallery,
            sharing,
            uploads,
        }
    }
}
