//! Public visibility, share links and embed snippets.

use crate::error::Result;
use crate::storage::models::{Album, AlbumUpdate};
use crate::storage::Database;

const EMBED_WIDTH: &str = "100%";
const EMBED_HEIGHT: &str = "600";

#[derive(Clone)]
pub struct SharingController {
    db: Database,
    origin: String,
    route_prefix: String,
}

impl SharingController {
    pub fn new(db: Database, origin: &str, route_prefix: &str) -> Self {
        Self {
            db,
            origin: origin.trim_end_matches('/').to_string(),
            route_prefix: route_prefix.trim_matches('/').to_string(),
        }
    }

    /// Flip an album's public flag. Store errors, ownership included, come back as is.
    pub fn set_public(&self, album_id: &str, owner_id: &str, is_public: bool) -> Result<Album> {
        let album = self
            .db
            .update_album(album_id, owner_id, &AlbumUpdate::visibility(is_public))?;
        tracing::debug!(album_id, is_public, "Changed album visibility");
        Ok(album)
    }

    /// `<origin>/<prefix>/<album_id>`
    pub fn build_share_link(&self, album_id: &str) -> String {
        let album_id = album_id.trim_matches('/');
        if self.route_prefix.is_empty() {
            format!("{}/{album_id}", self.origin)
        } else {
            format!("{}/{}/{album_id}", self.origin, self.route_prefix)
        }
    }

    pub fn build_embed_snippet(&self, album_id: &str, album_name: &str) -> String {
        format!(
            r#"<iframe src="{}?embed=true" title="{}" width="{EMBED_WIDTH}" height="{EMBED_HEIGHT}" style="border:0" loading="lazy" allowfullscreen></iframe>"#,
            escape_attribute(&self.build_share_link(album_id)),
            escape_attribute(album_name),
        )
    }
}

/// Escape text for use inside a double-quoted HTML attribute.
fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(origin: &str, prefix: &str) -> (tempfile::TempDir, SharingController) {
        let temp_dir = tempfile::tempdir().unwrap();
        let db = Database::open(temp_dir.path()).unwrap();
        (temp_dir, SharingController::new(db, origin, prefix))
    }

    #[test]
    fn test_share_link_normalizes_slashes() {
        let (_dir, sharing) = controller("https://photos.example.com/", "/public/album/");
        assert_eq!(
            sharing.build_share_link("abc-123"),
            "https://photos.example.com/public/album/abc-123"
        );
    }

    #[test]
    fn test_share_link_without_prefix() {
        let (_dir, sharing) = controller("https://photos.example.com", "");
        assert_eq!(
            sharing.build_share_link("abc"),
            "https://photos.example.com/abc"
        );
    }

    #[test]
    fn test_embed_snippet_escapes_name() {
        let (_dir, sharing) = controller("https://p.example", "public/album");
        let snippet = sharing.build_embed_snippet("a1", r#"Tom & "Jerry" <3"#);

        assert!(snippet.starts_with("<iframe "));
        assert!(snippet.contains(r#"src="https://p.example/public/album/a1?embed=true""#));
        assert!(snippet.contains(r#"title="Tom &amp; &quot;Jerry&quot; &lt;3""#));
        assert!(snippet.contains(r#"loading="lazy""#));
        assert!(snippet.contains(r#"width="100%""#));
        assert!(snippet.contains(r#"height="600""#));
    }

    #[test]
    fn test_embed_snippet_is_deterministic() {
        let (_dir, sharing) = controller("https://p.example", "public/album");
        assert_eq!(
            sharing.build_embed_snippet("a1", "Summer"),
            sharing.build_embed_snippet("a1", "Summer")
        );
    }

    #[test]
    fn test_set_public_requires_owner() {
        let (_dir, sharing) = controller("https://p.example", "public/album");
        let album = sharing.db.add_album("Trip", None, "alice").unwrap();

        let updated = sharing.set_public(&album.id, "alice", true).unwrap();
        assert!(updated.is_public);

        let err = sharing.set_public(&album.id, "mallory", false).unwrap_err();
        assert!(matches!(err, crate::error::GalleryError::Permission(_)));
    }
}
