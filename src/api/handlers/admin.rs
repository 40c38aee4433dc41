use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::{ApiError, JSend};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub albums_deleted: u64,
    pub photos_deleted: u64,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Wipe all metadata. Blobs are left in place.
pub async fn admin_purge(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<PurgeResponse>>, ApiError> {
    let stats = state
        .db
        .purge_all()
        .map_err(|e| ApiError::internal(e.to_string()))?;

    tracing::warn!(albums = stats.albums, photos = stats.photos, "Purged all data");

    Ok(JSend::success(PurgeResponse {
        albums_deleted: stats.albums,
        photos_deleted: stats.photos,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_state;

    #[tokio::test]
    async fn test_purge_removes_everything() {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = test_state(&temp_dir);
        state.gallery.create_album("One", None, "alice").unwrap();
        state.gallery.create_album("Two", None, "bob").unwrap();

        let purged = admin_purge(State(Arc::clone(&state))).await.unwrap();
        assert_eq!(purged.0.data.albums_deleted, 2);
        assert!(state.gallery.list_albums("alice").unwrap().is_empty());
    }
}
