use redb::TableDefinition;

/// Record tables and id-list indexes all share this shape.
pub type BytesTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Album records: uuid -> Album (msgpack)
pub const ALBUMS: BytesTable = TableDefinition::new("albums");

/// Photo records: uuid -> Photo (msgpack)
pub const PHOTOS: BytesTable = TableDefinition::new("photos");

/// Album index: album_id -> msgpack Vec of photo UUIDs
pub const ALBUM_PHOTOS: BytesTable = TableDefinition::new("album_photos");

/// Owner index: owner_id -> msgpack Vec of album UUIDs
pub const OWNER_ALBUMS: BytesTable = TableDefinition::new("owner_albums");

/// Blob URL index: url -> photo uuid (a URL identifies exactly one photo)
pub const PHOTO_URLS: TableDefinition<&str, &str> = TableDefinition::new("photo_urls");

/// Cached presentation order per album: album_id -> PhotoSort (msgpack)
pub const SORT_PREFERENCES: BytesTable = TableDefinition::new("sort_preferences");
