use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ingest_profile::SchedulerConfig;
use crate::database::feeds::{find_enabled, list_enabled};
use crate::modules::ingest::FeedSource;
use crate::modules::pipeline::{Pipeline, RunReport};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ImportSchedule {
    pub id: Uuid,
    /// `None` covers every enabled feed.
    pub feed_id: Option<Uuid>,
    pub interval_minutes: i32,
    pub next_run_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub active: bool,
}

/// First slot after `now` on the grid `next_run_at + k * interval`, k >= 1.
/// Missed slots are skipped.
pub fn next_run_after(next_run_at: DateTime<Utc>, interval_minutes: i32, now: DateTime<Utc>) -> DateTime<Utc> {
    let step = ChronoDuration::minutes(i64::from(interval_minutes.max(1)));
    let mut next = next_run_at + step;
    if next <= now {
        let behind = (now - next).num_seconds() / step.num_seconds() + 1;
        next = next + ChronoDuration::seconds(step.num_seconds() * behind);
    }
    next
}

/// Row access for the scheduler.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn count(&self) -> Result<i64>;
    async fn insert_all_feeds(&self, interval_minutes: i32) -> Result<()>;
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<ImportSchedule>>;
    async fn find_enabled_feed(&self, feed_id: Uuid) -> Result<Option<FeedSource>>;
    async fn list_enabled_feeds(&self) -> Result<Vec<FeedSource>>;
    async fn mark_ran(&self, id: Uuid, last_run_at: DateTime<Utc>, next_run_at: DateTime<Utc>) -> Result<()>;
}

/// What a firing schedule runs.
#[async_trait]
pub trait BatchRunner: Send + Sync {
    async fn run_batch(&self, feeds: &[FeedSource]) -> RunReport;
}

#[async_trait]
impl BatchRunner for Pipeline {
    async fn run_batch(&self, feeds: &[FeedSource]) -> RunReport {
        Pipeline::run_batch(self, feeds).await
    }
}

pub struct PgScheduleStore {
    pool: PgPool,
}

impl PgScheduleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduleStore for PgScheduleStore {
    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM import_schedules")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn insert_all_feeds(&self, interval_minutes: i32) -> Result<()> {
        sqlx::query(
            "INSERT INTO import_schedules (id, feed_id, interval_minutes, next_run_at, active)
             VALUES ($1, NULL, $2, NOW(), TRUE)"
        )
        .bind(Uuid::new_v4())
        .bind(interval_minutes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<ImportSchedule>> {
        let due = sqlx::query_as::<_, ImportSchedule>(
            "SELECT id, feed_id, interval_minutes, next_run_at, last_run_at, active
             FROM import_schedules
             WHERE active = TRUE AND next_run_at <= $1
             ORDER BY next_run_at"
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(due)
    }

    async fn find_enabled_feed(&self, feed_id: Uuid) -> Result<Option<FeedSource>> {
        find_enabled(&self.pool, feed_id).await
    }

    async fn list_enabled_feeds(&self) -> Result<Vec<FeedSource>> {
        list_enabled(&self.pool).await
    }

    async fn mark_ran(&self, id: Uuid, last_run_at: DateTime<Utc>, next_run_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE import_schedules SET last_run_at = $1, next_run_at = $2 WHERE id = $3")
            .bind(last_run_at)
            .bind(next_run_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct Scheduler {
    store: Arc<dyn ScheduleStore>,
    runner: Arc<dyn BatchRunner>,
    cfg: SchedulerConfig,
}

impl Scheduler {
    pub fn new(store: Arc<dyn ScheduleStore>, runner: Arc<dyn BatchRunner>, cfg: SchedulerConfig) -> Self {
        Self { store, runner, cfg }
    }

    /// Seeds one all-feeds schedule on an empty table. Returns true when it did.
    pub async fn ensure_default_schedule(&self) -> Result<bool> {
        if self.store.count().await? > 0 {
            return Ok(false);
        }
        let interval = self.cfg.default_interval_minutes.max(1);
        self.store.insert_all_feeds(interval).await?;
        info!("🗓️ Created default schedule: all feeds every {} min", interval);
        Ok(true)
    }

    /// Runs every due schedule once. A failing schedule does not stop the others.
    pub async fn tick(&self) -> Result<usize> {
        let due = self.store.due(Utc::now()).await.context("loading due schedules")?;
        for schedule in &due {
            if let Err(e) = self.run_schedule(schedule).await {
                error!("❌ Schedule {} failed: {:#}", schedule.id, e);
            }
        }
        Ok(due.len())
    }

    async fn run_schedule(&self, schedule: &ImportSchedule) -> Result<()> {
        let feeds = match schedule.feed_id {
            Some(feed_id) => match self.store.find_enabled_feed(feed_id).await? {
                Some(feed) => vec![feed],
                None => {
                    warn!("⚠️ Schedule {} points at a missing or disabled feed {}", schedule.id, feed_id);
                    vec![]
                }
            },
            None => self.store.list_enabled_feeds().await?,
        };

        if !feeds.is_empty() {
            info!("⏰ Schedule {} firing for {} feed(s)", schedule.id, feeds.len());
            self.runner.run_batch(&feeds).await;
        }

        let finished = Utc::now();
        let next = next_run_after(schedule.next_run_at, schedule.interval_minutes, finished);
        self.store.mark_ran(schedule.id, finished, next).await?;

        info!("🗓️ Schedule {} next run at {}", schedule.id, next.format("%Y-%m-%d %H:%M:%S UTC"));
        Ok(())
    }

    pub async fn run(&self) {
        let tick = Duration::from_secs(self.cfg.tick_sec.max(1));
        info!("✅ Scheduler loop starting (tick {}s)...", tick.as_secs());
        loop {
            match self.tick().await {
                Ok(0) => {}
                Ok(n) => info!("Tick handled {} schedule(s)", n),
                Err(e) => error!("❌ Scheduler tick failed: {:#}", e),
            }
            sleep(tick).await;
        }
    }
}
