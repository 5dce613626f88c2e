use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::modules::pipeline::RunReport;
use crate::modules::validation::ArticleDraft;

/// Persistence seam for the router and the pipeline.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// True when the URL is already published or waiting for moderation.
    async fn source_exists(&self, source_url: &str) -> Result<bool>;
    async fn slug_exists(&self, slug: &str) -> Result<bool>;
    /// `None` when a concurrent writer already stored the same source URL.
    async fn insert_published(&self, feed_id: Option<Uuid>, draft: &ArticleDraft) -> Result<Option<Uuid>>;
    async fn insert_pending(&self, feed_id: Option<Uuid>, draft: &ArticleDraft) -> Result<Option<Uuid>>;
    async fn record_run(&self, report: &RunReport) -> Result<()>;
}

pub struct PgArticleStore {
    pool: PgPool,
}

impl PgArticleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn source_exists(&self, source_url: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM articles WHERE source_url = $1)
                 OR EXISTS (SELECT 1 FROM moderation_queue WHERE source_url = $1)"
        )
        .bind(source_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM articles WHERE slug = $1)
                 OR EXISTS (SELECT 1 FROM moderation_queue WHERE slug = $1 AND status = 'pending')"
        )
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_published(&self, feed_id: Option<Uuid>, draft: &ArticleDraft) -> Result<Option<Uuid>> {
        let id: Option<Uuid> = sqlx::query_scalar(
            "INSERT INTO articles
                (id, feed_id, title, slug, summary, content, category, tags, seo, image, source_url, source_published_at, published_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
             ON CONFLICT (source_url) DO NOTHING
             RETURNING id"
        )
        .bind(Uuid::new_v4())
        .bind(feed_id)
        .bind(&draft.title)
        .bind(&draft.slug)
        .bind(&draft.summary)
        .bind(&draft.content)
        .bind(&draft.category)
        .bind(&draft.tags)
        .bind(json!(draft.seo))
        .bind(draft.image.as_ref().map(|i| json!(i)))
        .bind(&draft.source_url)
        .bind(draft.source_published_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn insert_pending(&self, feed_id: Option<Uuid>, draft: &ArticleDraft) -> Result<Option<Uuid>> {
        let id: Option<Uuid> = sqlx::query_scalar(
            "INSERT INTO moderation_queue (id, feed_id, title, slug, category, source_url, payload, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
             ON CONFLICT (source_url) DO NOTHING
             RETURNING id"
        )
        .bind(Uuid::new_v4())
        .bind(feed_id)
        .bind(&draft.title)
        .bind(&draft.slug)
        .bind(&draft.category)
        .bind(&draft.source_url)
        .bind(json!(draft))
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn record_run(&self, report: &RunReport) -> Result<()> {
        sqlx::query(
            "INSERT INTO import_runs
                (id, feed_id, started_at, fetched, duplicates, published, queued, failed, dry_run, errors)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        )
        .bind(Uuid::new_v4())
        .bind(report.feed_id)
        .bind(report.started_at)
        .bind(report.fetched as i32)
        .bind(report.duplicates as i32)
        .bind(report.published as i32)
        .bind(report.queued as i32)
        .bind(report.failed as i32)
        .bind(report.dry_run)
        .bind(json!(report.errors))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
