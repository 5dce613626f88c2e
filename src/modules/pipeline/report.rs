use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

const MAX_ERROR_SAMPLES: usize = 20;

/// Counters for one feed run, or the sum of several.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub feed_id: Option<Uuid>,
    pub feed_name: String,
    pub started_at: DateTime<Utc>,
    pub fetched: usize,
    pub duplicates: usize,
    pub published: usize,
    pub queued: usize,
    pub failed: usize,
    /// Nothing was written; `published`/`queued` count what would have been.
    pub dry_run: bool,
    pub errors: Vec<String>,
}

impl RunReport {
    pub fn start(feed_id: Option<Uuid>, feed_name: &str, dry_run: bool) -> Self {
        Self {
            feed_id,
            feed_name: feed_name.to_string(),
            started_at: Utc::now(),
            dry_run,
            ..Default::default()
        }
    }

    pub fn record_failure(&mut self, context: &str, err: impl fmt::Display) {
        self.failed += 1;
        if self.errors.len() < MAX_ERROR_SAMPLES {
            self.errors.push(format!("{}: {}", context, err));
        }
    }

    pub fn absorb(&mut self, other: &RunReport) {
        self.fetched += other.fetched;
        self.duplicates += other.duplicates;
        self.published += other.published;
        self.queued += other.queued;
        self.failed += other.failed;
        self.dry_run |= other.dry_run;
        let room = MAX_ERROR_SAMPLES.saturating_sub(self.errors.len());
        self.errors.extend(other.errors.iter().take(room).cloned());
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] fetched={} duplicates={} published={} queued={} failed={}{}",
            self.feed_name,
            self.fetched,
            self.duplicates,
            self.published,
            self.queued,
            self.failed,
            if self.dry_run { " (dry run)" } else { "" }
        )
    }
}
