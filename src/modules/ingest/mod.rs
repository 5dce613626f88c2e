pub mod structs;
pub mod text;
pub mod extractor;
pub mod feed_reader;
pub mod content;

use anyhow::Result;
use async_trait::async_trait;

pub use structs::{FeedItem, FeedSource};
pub use feed_reader::FeedReader;
pub use content::ContentFetcher;

/// Anything that can turn an article URL into plain text.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String>;
}
