mod config;
mod database;
mod utils;
mod modules;

use std::env;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Context;
use tracing::{info, error, warn};
use tracing_subscriber::EnvFilter;
use sqlx::postgres::PgPoolOptions;
use dotenvy::dotenv;

use crate::config::IngestProfile;
use crate::database::feeds::{list_enabled, sync_feed_configs};
use crate::database::init_database;
use crate::utils::http_client::HttpClientFactory;
use crate::utils::notifier::EditorialNotifier;
use crate::modules::ingest::{ContentFetcher, FeedReader};
use crate::modules::rewrite::LlmRewriter;
use crate::modules::publish::PgArticleStore;
use crate::modules::pipeline::Pipeline;
use crate::modules::schedule::{PgScheduleStore, Scheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let run_once = env::args().skip(1).any(|a| a == "--once");
    info!("Starting feed_ingest v{}{}...", env!("CARGO_PKG_VERSION"), if run_once { " (single batch)" } else { "" });

    // 1. Config + database
    let profile = IngestProfile::load().context("Failed to load ingest config")?;
    if profile.pipeline.dry_run {
        warn!("🧪 DRY RUN enabled: nothing will be written to articles or moderation_queue");
    }
    let db_url = env::var("DATABASE_URL").context("DATABASE_URL must be set in .env")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&db_url)
        .await
        .map_err(|e| {
            error!("CRITICAL: DB Connection Failed! Is Postgres running?");
            e
        })?;

    init_database(&pool).await?;

    let feed_configs: Vec<_> = profile.enabled_feeds().cloned().collect();
    match sync_feed_configs(&pool, &feed_configs, profile.pipeline.default_max_items).await {
        Ok(n) => info!("📚 {} configured feed(s) synced", n),
        Err(e) => warn!("⚠️ Feed config sync failed: {:#}", e),
    }

    // 2. Modules
    let std_client = HttpClientFactory::create()?;
    let llm_client = HttpClientFactory::create_llm()?;

    let notifier = Arc::new(EditorialNotifier::new(std_client.clone()));
    if !notifier.is_enabled() {
        info!("Editorial webhook not configured, notifications disabled");
    }

    let rewriter = LlmRewriter::new(llm_client, &profile.llm);
    info!("🧠 Rewriter model: {}", rewriter.model());

    let pipeline = Arc::new(Pipeline::new(
        FeedReader::new(std_client.clone()),
        Arc::new(ContentFetcher::new(std_client.clone(), profile.pipeline.max_content_chars)),
        Arc::new(rewriter),
        Arc::new(PgArticleStore::new(pool.clone())),
        Some(notifier),
        profile.pipeline.clone(),
    ));

    // 3. One-shot batch
    if run_once {
        let feeds = list_enabled(&pool).await?;
        if feeds.is_empty() {
            warn!("⚠️ No enabled feeds. Add some to ingest_config.toml or feed_sources.");
            return Ok(());
        }
        let report = pipeline.run_batch(&feeds).await;
        info!("✅ Done: {}", report);
        return Ok(());
    }

    // 4. Scheduler loop
    let scheduler = Scheduler::new(Arc::new(PgScheduleStore::new(pool.clone())), pipeline, profile.scheduler.clone());
    if let Err(e) = scheduler.ensure_default_schedule().await {
        error!("Failed to seed default schedule: {:#}", e);
    }
    scheduler.run().await;

    Ok(())
}
