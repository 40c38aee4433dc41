//! Lightbox viewer: navigation, progressive loading, prefetch and the
//! save/share fallback chain.

mod lightbox;
mod session;
mod share;

pub use lightbox::{
    GestureState, Key, LoadOutcome, LoadPlan, LoadResult, LoadStatus, Lightbox, PrefetchTarget,
    ViewerAction, ViewerOptions,
};
pub use session::LightboxSession;
pub use share::{
    save_or_share, DownloadDirPlatform, FetchError, HttpFetcher, MediaFetcher, SaveOutcome,
    ShareError, SharePlatform, SharedFile, SAVE_INSTRUCTIONS,
};
