use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One `<item>`/`<entry>` pulled out of a feed document.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    /// Raw HTML as found in the feed (CDATA already unwrapped).
    pub description: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

/// A row of `feed_sources`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedSource {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub enabled: bool,
    pub auto_publish: bool,
    pub default_category: Option<String>,
    pub max_items: i32,
}

impl FeedSource {
    pub fn item_limit(&self) -> usize {
        self.max_items.max(1) as usize
    }
}
