use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

/// Files accepted in one upload request at the per-file size limit
const MAX_FILES_PER_UPLOAD: usize = 20;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = (state.config.max_upload_size as usize).saturating_mul(MAX_FILES_PER_UPLOAD);

    let mut router = Router::new()
        // Albums
        .route("/albums", get(handlers::list_albums))
        .route("/albums", post(handlers::create_album))
        .route("/albums/:id", put(handlers::update_album))
        .route("/albums/:id", delete(handlers::delete_album))
        .route("/albums/:id/visibility", put(handlers::set_visibility))
        .route("/albums/:id/cover", put(handlers::set_cover))
        .route("/albums/:id/share", get(handlers::share_album))
        .route("/albums/:id/photos", get(handlers::list_photos))
        .route("/albums/:id/sort", put(handlers::set_sort))
        // Uploads
        .route(
            "/uploads",
            post(handlers::create_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Photos
        .route("/photos/:id", delete(handlers::delete_photo))
        .route("/photos/delete", post(handlers::delete_selection))
        // Public read model
        .route("/public/albums/:id", get(handlers::get_public_album))
        // Blob content (local backend)
        .route("/blobs/*path", get(handlers::serve_blob))
        // Internal
        .route("/_internal/health", get(handlers::health));

    // Test-only routes
    if state.config.test_mode {
        tracing::warn!("Test mode enabled, purge route is available.");
        router = router.route("/admin/purge", delete(handlers::admin_purge));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
