use std::collections::HashSet;

use serde::Serialize;

use crate::error::{GalleryError, Result};
use crate::storage::models::Photo;
use crate::thumbnail::{thumbnail_url_with_size, ThumbnailSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Loading,
    Loaded,
    Error,
}

/// Horizontal drag in progress, in viewport pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GestureState {
    pub drag_start_x: Option<f64>,
    pub drag_delta_x: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Escape,
    Other,
}

impl Key {
    /// Map a DOM-style key name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "ArrowLeft" => Key::ArrowLeft,
            "ArrowRight" => Key::ArrowRight,
            "Escape" | "Esc" => Key::Escape,
            _ => Key::Other,
        }
    }
}

/// What the caller has to do after an input event.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerAction {
    Navigated(LoadPlan),
    Closed,
    Ignored,
}

/// Loads implied by showing `index`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadPlan {
    pub index: usize,
    /// Shown right away: the full URL when cached, else the thumbnail
    pub display_url: String,
    pub full_url: String,
    /// Whether the full URL still has to be fetched
    pub needs_load: bool,
    /// Neighbour URLs to warm, never awaited
    pub prefetch: Vec<PrefetchTarget>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrefetchTarget {
    pub index: usize,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded,
    Failed(String),
}

/// A finished load, tagged with the index it was issued for.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    pub index: usize,
    pub url: String,
    pub outcome: LoadOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerOptions {
    /// Fraction of the viewport width a drag must exceed to navigate
    pub swipe_threshold: f64,
    pub thumbnail_size: ThumbnailSize,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            swipe_threshold: 0.2,
            thumbnail_size: ThumbnailSize::default(),
        }
    }
}

/// Lightbox state for one viewing session over an ordered photo sequence.
///
/// Holds no I/O. Every transition returns the loads it implies and load
/// results are fed back through [`Lightbox::apply`].
#[derive(Debug, Clone)]
pub struct Lightbox {
    photos: Vec<Photo>,
    current_index: usize,
    load_status: LoadStatus,
    display_url: String,
    gesture: GestureState,
    open: bool,
    cached: HashSet<String>,
    viewport_width: f64,
    options: ViewerOptions,
}

impl Lightbox {
    pub fn new(options: ViewerOptions) -> Self {
        Self {
            photos: Vec::new(),
            current_index: 0,
            load_status: LoadStatus::Loading,
            display_url: String::new(),
            gesture: GestureState::default(),
            open: false,
            cached: HashSet::new(),
            viewport_width: 0.0,
            options,
        }
    }

    pub fn open(&mut self, photos: Vec<Photo>, index: usize) -> Result<LoadPlan> {
        if photos.is_empty() {
            return Err(GalleryError::Validation(
                "cannot open the viewer on an empty sequence".to_string(),
            ));
        }
        if index >= photos.len() {
            return Err(GalleryError::Validation(format!(
                "index {index} is out of range for {} photos",
                photos.len()
            )));
        }

        self.photos = photos;
        self.open = true;
        self.gesture = GestureState::default();
        Ok(self.show(index))
    }

    pub fn close(&mut self) {
        self.open = false;
        self.gesture = GestureState::default();
    }

    pub fn backdrop_click(&mut self) -> ViewerAction {
        if !self.open {
            return ViewerAction::Ignored;
        }
        self.close();
        ViewerAction::Closed
    }

    pub fn next(&mut self) -> Option<LoadPlan> {
        if !self.open || self.photos.is_empty() {
            return None;
        }
        let n = self.photos.len();
        Some(self.show((self.current_index + 1) % n))
    }

    pub fn prev(&mut self) -> Option<LoadPlan> {
        if !self.open || self.photos.is_empty() {
            return None;
        }
        let n = self.photos.len();
        Some(self.show((self.current_index + n - 1) % n))
    }

    pub fn go_to(&mut self, index: usize) -> Option<LoadPlan> {
        if !self.open || index >= self.photos.len() {
            return None;
        }
        Some(self.show(index))
    }

    pub fn handle_key(&mut self, key: Key) -> ViewerAction {
        if !self.open {
            return ViewerAction::Ignored;
        }
        match key {
            Key::ArrowRight => self.next().map_or(ViewerAction::Ignored, ViewerAction::Navigated),
            Key::ArrowLeft => self.prev().map_or(ViewerAction::Ignored, ViewerAction::Navigated),
            Key::Escape => {
                self.close();
                ViewerAction::Closed
            }
            Key::Other => ViewerAction::Ignored,
        }
    }

    pub fn set_viewport_width(&mut self, width: f64) {
        self.viewport_width = width.max(0.0);
    }

    pub fn drag_start(&mut self, x: f64) {
        if self.open {
            self.gesture = GestureState {
                drag_start_x: Some(x),
                drag_delta_x: 0.0,
            };
        }
    }

    pub fn drag_move(&mut self, x: f64) {
        if let Some(start) = self.gesture.drag_start_x {
            self.gesture.drag_delta_x = x - start;
        }
    }

    /// Release the drag. Past the threshold a left swipe shows the next
    /// photo and a right swipe the previous one.
    pub fn drag_end(&mut self) -> ViewerAction {
        let gesture = std::mem::take(&mut self.gesture);
        if gesture.drag_start_x.is_none() {
            return ViewerAction::Ignored;
        }

        let threshold = self.options.swipe_threshold * self.viewport_width;
        if gesture.drag_delta_x.abs() <= threshold {
            return ViewerAction::Ignored;
        }

        let plan = if gesture.drag_delta_x < 0.0 {
            self.next()
        } else {
            self.prev()
        };
        plan.map_or(ViewerAction::Ignored, ViewerAction::Navigated)
    }

    /// Feed back a finished load. Every successful load marks its URL cached;
    /// only a result for the photo currently shown changes the status.
    /// Returns whether the visible state changed.
    ///
    /// A result issued for another index still counts when a snapshot has
    /// since moved the photo it loaded onto the current index.
    pub fn apply(&mut self, result: &LoadResult) -> bool {
        if result.outcome == LoadOutcome::Loaded {
            self.cached.insert(result.url.clone());
        }

        if !self.open || self.load_status != LoadStatus::Loading {
            return false;
        }
        let Some(photo) = self.photos.get(self.current_index) else {
            return false;
        };
        // Urls are unique per photo, so this also rejects results issued for
        // whatever used to sit at the current index
        if photo.url != result.url {
            if result.index == self.current_index {
                tracing::trace!(url = %result.url, "Dropping load for a replaced photo");
            }
            return false;
        }

        match result.outcome {
            LoadOutcome::Loaded => {
                self.load_status = LoadStatus::Loaded;
                self.display_url = result.url.clone();
            }
            LoadOutcome::Failed(ref reason) => {
                tracing::debug!(url = %result.url, %reason, "Full-resolution load failed");
                self.load_status = LoadStatus::Error;
            }
        }
        true
    }

    /// Replace the sequence with a fresh snapshot. The current photo is kept
    /// when it still exists; otherwise the index is clamped. An empty snapshot
    /// closes the viewer. Returns a plan when a different photo is now shown.
    pub fn replace_photos(&mut self, photos: Vec<Photo>) -> Option<LoadPlan> {
        let current_id = self.current_photo().map(|p| p.id.clone());
        self.photos = photos;

        if self.photos.is_empty() {
            self.close();
            return None;
        }
        if !self.open {
            self.current_index = self.current_index.min(self.photos.len() - 1);
            return None;
        }

        match current_id.and_then(|id| self.photos.iter().position(|p| p.id == id)) {
            Some(index) => {
                // Same photo, possibly at a new position
                self.current_index = index;
                None
            }
            None => Some(self.show(self.current_index.min(self.photos.len() - 1))),
        }
    }

    fn show(&mut self, index: usize) -> LoadPlan {
        self.current_index = index;
        let full_url = self.photos[index].url.clone();
        let thumbnail = self.thumbnail_for(&full_url);

        let needs_load = !self.cached.contains(&full_url);
        if needs_load {
            self.load_status = LoadStatus::Loading;
            self.display_url = if thumbnail.is_empty() {
                full_url.clone()
            } else {
                thumbnail
            };
        } else {
            self.load_status = LoadStatus::Loaded;
            self.display_url = full_url.clone();
        }

        LoadPlan {
            index,
            display_url: self.display_url.clone(),
            full_url,
            needs_load,
            prefetch: self.prefetch_targets(index),
        }
    }

    fn prefetch_targets(&self, index: usize) -> Vec<PrefetchTarget> {
        let n = self.photos.len();
        if n < 2 {
            return Vec::new();
        }

        let mut neighbours = vec![(index + 1) % n, (index + n - 1) % n];
        neighbours.dedup();

        let mut targets = Vec::new();
        let mut seen = HashSet::new();
        for neighbour in neighbours {
            let full = &self.photos[neighbour].url;
            let thumbnail = self.thumbnail_for(full);
            for url in [thumbnail, full.clone()] {
                if url.is_empty() || self.cached.contains(&url) || !seen.insert(url.clone()) {
                    continue;
                }
                targets.push(PrefetchTarget {
                    index: neighbour,
                    url,
                });
            }
        }
        targets
    }

    fn thumbnail_for(&self, url: &str) -> String {
        thumbnail_url_with_size(url, self.options.thumbnail_size)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_photo(&self) -> Option<&Photo> {
        self.photos.get(self.current_index)
    }

    /// File name of the photo shown, also when its load failed.
    pub fn current_file_name(&self) -> Option<&str> {
        self.current_photo().map(|p| p.file_name.as_str())
    }

    pub fn load_status(&self) -> LoadStatus {
        self.load_status
    }

    pub fn display_url(&self) -> &str {
        &self.display_url
    }

    pub fn gesture(&self) -> GestureState {
        self.gesture
    }

    pub fn is_cached(&self, url: &str) -> bool {
        self.cached.contains(url)
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }
}
