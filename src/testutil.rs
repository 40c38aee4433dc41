//! Shared test helpers for handler tests.

use std::sync::Arc;

use crate::config::Config;
use crate::object_store::LocalStore;
use crate::storage::Database;
use crate::AppState;

/// Create a test AppState with a temporary database and local object store.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let files_dir = temp_dir.path().join("files");

    let mut config = Config::default();
    config.server.bind_address = "127.0.0.1:0".to_string();
    config.server.data_dir = data_dir.to_string_lossy().to_string();
    config.storage.local_storage_path = files_dir.to_string_lossy().to_string();
    config.test_mode = true;

    let db = Database::open(&data_dir).expect("Failed to open test database");
    let object_store = LocalStore::new(&files_dir, &config.storage.blob_base_url)
        .expect("Failed to create test object store");

    Arc::new(AppState::new(config, db, Arc::new(object_store)))
}
