use anyhow::Result;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::config::FeedConfig;
use crate::modules::ingest::FeedSource;

/// Inserts or refreshes config-file feeds, keyed by URL.
pub async fn sync_feed_configs(pool: &PgPool, feeds: &[FeedConfig], default_max_items: usize) -> Result<usize> {
    for feed in feeds {
        let max_items = feed.max_items.unwrap_or(default_max_items).max(1) as i32;
        sqlx::query(
            "INSERT INTO feed_sources (id, name, url, enabled, auto_publish, default_category, max_items)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (url) DO UPDATE SET
                name = EXCLUDED.name,
                enabled = EXCLUDED.enabled,
                auto_publish = EXCLUDED.auto_publish,
                default_category = EXCLUDED.default_category,
                max_items = EXCLUDED.max_items"
        )
        .bind(Uuid::new_v4())
        .bind(&feed.name)
        .bind(&feed.url)
        .bind(feed.enabled)
        .bind(feed.auto_publish)
        .bind(&feed.default_category)
        .bind(max_items)
        .execute(pool)
        .await?;
    }
    if !feeds.is_empty() {
        info!("📚 Synced {} feed(s) from config", feeds.len());
    }
    Ok(feeds.len())
}

pub async fn list_enabled(pool: &PgPool) -> Result<Vec<FeedSource>> {
    let feeds = sqlx::query_as::<_, FeedSource>(
        "SELECT id, name, url, enabled, auto_publish, default_category, max_items
         FROM feed_sources WHERE enabled = TRUE ORDER BY name"
    )
    .fetch_all(pool)
    .await?;
    Ok(feeds)
}

pub async fn find_enabled(pool: &PgPool, id: Uuid) -> Result<Option<FeedSource>> {
    let feed = sqlx::query_as::<_, FeedSource>(
        "SELECT id, name, url, enabled, auto_publish, default_category, max_items
         FROM feed_sources WHERE id = $1 AND enabled = TRUE"
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(feed)
}
