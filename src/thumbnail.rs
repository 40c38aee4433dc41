//! Thumbnail URL resolution by naming convention.
//!
//! The blob store derives a resized rendition of every uploaded image and stores
//! it next to the original with a `_<width>x<height>` suffix before the
//! extension. Resolving a thumbnail is therefore pure string work: no store call.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Extensions that never get a derived rendition
pub const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mov", ".webm", ".avi", ".mkv"];

/// Bounding box of the derived rendition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self {
            width: 400,
            height: 400,
        }
    }
}

impl fmt::Display for ThumbnailSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for ThumbnailSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once('x')
            .ok_or_else(|| format!("thumbnail size '{s}' must look like 400x400"))?;
        let width: u32 = w
            .trim()
            .parse()
            .map_err(|_| format!("invalid thumbnail width '{w}'"))?;
        let height: u32 = h
            .trim()
            .parse()
            .map_err(|_| format!("invalid thumbnail height '{h}'"))?;
        if width == 0 || height == 0 {
            return Err("thumbnail dimensions must be positive".to_string());
        }
        Ok(Self { width, height })
    }
}

/// Thumbnail URL at the default `400x400` size. `None` or empty yields `""`.
pub fn thumbnail_url(original: Option<&str>) -> String {
    match original {
        Some(url) => thumbnail_url_with_size(url, ThumbnailSize::default()),
        None => String::new(),
    }
}

/// Insert `_<size>` before the extension of the last path segment, keeping the
/// query string (store access tokens) intact. Videos and extension-less paths
/// come back unchanged.
pub fn thumbnail_url_with_size(original: &str, size: ThumbnailSize) -> String {
    if original.is_empty() {
        return String::new();
    }

    let (path, query) = match original.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (original, None),
    };

    if is_video_path(path) {
        return original.to_string();
    }

    let last_slash = path.rfind('/');
    let Some(last_dot) = path.rfind('.') else {
        return original.to_string();
    };
    if last_slash.is_some_and(|slash| last_dot < slash) {
        return original.to_string();
    }

    let (stem, extension) = path.split_at(last_dot);
    let mut resolved = format!("{stem}_{size}{extension}");
    if let Some(query) = query {
        resolved.push('?');
        resolved.push_str(query);
    }
    resolved
}

/// Whether a path (without query string) names a video by extension.
pub fn is_video_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}
