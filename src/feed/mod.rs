//! Classifier feed ingest: streaming XML reader, loaders and file discovery.

mod discover;
mod loader;
mod reader;

pub use discover::FeedFiles;
pub use loader::{has_short_name, is_live_and_active, FeedLoader};
pub use reader::{open_document, Record, XmlRecords};
