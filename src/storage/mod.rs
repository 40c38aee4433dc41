mod albums;
mod batch;
pub mod db;
mod live;
pub mod models;
mod photos;
pub mod query;
mod tables;

pub use batch::{Batch, BatchOutcome};
pub use db::{Database, DatabaseError, PurgeStats};
pub use live::Subscription;
pub use query::{AlbumDocument, AlbumQuery, LiveQuery, PhotoQuery};
pub use tables::*;
