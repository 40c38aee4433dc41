use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::lightbox::{Key, LoadOutcome, LoadPlan, LoadResult, Lightbox, ViewerAction, ViewerOptions};
use super::share::{save_or_share, MediaFetcher, SaveOutcome, SharePlatform};
use crate::error::Result;
use crate::storage::models::Photo;

/// A lightbox wired to a fetcher.
///
/// Loads run as spawned tasks and report back over a channel; results are
/// applied by [`LightboxSession::settle`] or [`LightboxSession::poll_results`].
/// Closing (or dropping) the session cancels whatever is still in flight.
pub struct LightboxSession {
    lightbox: Lightbox,
    fetcher: Arc<dyn MediaFetcher>,
    cancel: CancellationToken,
    results_tx: mpsc::UnboundedSender<LoadResult>,
    results_rx: mpsc::UnboundedReceiver<LoadResult>,
    in_flight: usize,
}

impl LightboxSession {
    /// Open on `photos[index]`. Must be called from within a tokio runtime.
    pub fn open(
        photos: Vec<Photo>,
        index: usize,
        fetcher: Arc<dyn MediaFetcher>,
        options: ViewerOptions,
    ) -> Result<Self> {
        let mut lightbox = Lightbox::new(options);
        let plan = lightbox.open(photos, index)?;
        let (results_tx, results_rx) = mpsc::unbounded_channel();

        let mut session = Self {
            lightbox,
            fetcher,
            cancel: CancellationToken::new(),
            results_tx,
            results_rx,
            in_flight: 0,
        };
        session.execute(plan);
        Ok(session)
    }

    pub fn lightbox(&self) -> &Lightbox {
        &self.lightbox
    }

    pub fn set_viewport_width(&mut self, width: f64) {
        self.lightbox.set_viewport_width(width);
    }

    pub fn next(&mut self) {
        if let Some(plan) = self.lightbox.next() {
            self.execute(plan);
        }
    }

    pub fn prev(&mut self) {
        if let Some(plan) = self.lightbox.prev() {
            self.execute(plan);
        }
    }

    pub fn go_to(&mut self, index: usize) {
        if let Some(plan) = self.lightbox.go_to(index) {
            self.execute(plan);
        }
    }

    pub fn handle_key(&mut self, key: Key) -> ViewerAction {
        let action = self.lightbox.handle_key(key);
        self.follow(&action);
        action
    }

    pub fn backdrop_click(&mut self) -> ViewerAction {
        let action = self.lightbox.backdrop_click();
        self.follow(&action);
        action
    }

    pub fn drag_start(&mut self, x: f64) {
        self.lightbox.drag_start(x);
    }

    pub fn drag_move(&mut self, x: f64) {
        self.lightbox.drag_move(x);
    }

    pub fn drag_end(&mut self) -> ViewerAction {
        let action = self.lightbox.drag_end();
        self.follow(&action);
        action
    }

    /// Swap in a fresh snapshot of the sequence.
    pub fn replace_photos(&mut self, photos: Vec<Photo>) {
        if let Some(plan) = self.lightbox.replace_photos(photos) {
            self.execute(plan);
        }
        if !self.lightbox.is_open() {
            self.cancel.cancel();
        }
    }

    pub fn close(&mut self) {
        self.lightbox.close();
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Wait for the next load to finish and apply it. `None` once nothing is
    /// in flight or the session is closed.
    pub async fn settle(&mut self) -> Option<LoadResult> {
        if self.in_flight == 0 || self.cancel.is_cancelled() {
            return None;
        }
        let result = self.results_rx.recv().await?;
        self.in_flight -= 1;
        self.lightbox.apply(&result);
        Some(result)
    }

    /// Apply every result that is already available without waiting.
    pub fn poll_results(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(result) = self.results_rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            self.lightbox.apply(&result);
            applied += 1;
        }
        applied
    }

    /// Run the save/share chain for the photo on screen.
    pub async fn save_current(&self, platform: &dyn SharePlatform) -> Option<SaveOutcome> {
        let photo = self.lightbox.current_photo()?;
        Some(save_or_share(photo, self.fetcher.as_ref(), platform).await)
    }

    fn follow(&mut self, action: &ViewerAction) {
        match action {
            ViewerAction::Navigated(plan) => self.execute(plan.clone()),
            ViewerAction::Closed => self.cancel.cancel(),
            ViewerAction::Ignored => {}
        }
    }

    fn execute(&mut self, plan: LoadPlan) {
        if plan.needs_load {
            self.spawn_load(plan.index, plan.full_url);
        }
        for target in plan.prefetch {
            self.spawn_load(target.index, target.url);
        }
    }

    fn spawn_load(&mut self, index: usize, url: String) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.in_flight += 1;

        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.results_tx.clone();
        let cancel = self.cancel.child_token();
        tokio::spawn(async move {
            let fetched = tokio::select! {
                _ = cancel.cancelled() => None,
                fetched = fetcher.fetch(&url) => Some(fetched),
            };
            let outcome = match fetched {
                Some(Ok(_)) => LoadOutcome::Loaded,
                Some(Err(e)) => LoadOutcome::Failed(e.to_string()),
                None => {
                    tracing::debug!(%url, "Load cancelled");
                    return;
                }
            };
            // The session may be gone already
            let _ = tx.send(LoadResult { index, url, outcome });
        });
    }
}

impl Drop for LightboxSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
