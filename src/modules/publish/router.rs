use anyhow::{bail, Result};
use tracing::{debug, info};
use uuid::Uuid;

use super::store::ArticleStore;
use crate::modules::ingest::FeedSource;
use crate::modules::validation::schema::SLUG_MAX;
use crate::modules::validation::ArticleDraft;

const SLUG_ATTEMPTS: usize = 5;
const SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Published { id: Uuid, slug: String },
    Queued { id: Uuid, slug: String },
    Duplicate,
    /// Dry run: nothing written, `would_publish` tells which table it would have hit.
    DryRun { would_publish: bool },
}

/// Returns `slug`, or `slug-xxxxxx` when the plain slug is taken.
pub async fn unique_slug(store: &dyn ArticleStore, slug: &str) -> Result<String> {
    if !store.slug_exists(slug).await? {
        return Ok(slug.to_string());
    }
    let base_len = SLUG_MAX - SUFFIX_LEN - 1;
    let base = slug.get(..base_len).unwrap_or(slug).trim_end_matches('-');
    for _ in 0..SLUG_ATTEMPTS {
        let suffix = Uuid::new_v4().simple().to_string();
        let candidate = format!("{}-{}", base, &suffix[..SUFFIX_LEN]);
        if !store.slug_exists(&candidate).await? {
            debug!("Slug {} taken, using {}", slug, candidate);
            return Ok(candidate);
        }
    }
    bail!("could not find a free slug for {}", slug)
}

/// Sends a validated draft to `articles` (auto-publish feeds) or to the
/// moderation queue.
pub async fn route(store: &dyn ArticleStore, feed: &FeedSource, mut draft: ArticleDraft, dry_run: bool) -> Result<RouteOutcome> {
    if store.source_exists(&draft.source_url).await? {
        return Ok(RouteOutcome::Duplicate);
    }

    draft.slug = unique_slug(store, &draft.slug).await?;

    if dry_run {
        info!("🧪 [DRY RUN] [{}] would {} \"{}\" ({})",
            feed.name, if feed.auto_publish { "publish" } else { "queue" }, draft.title, draft.slug);
        return Ok(RouteOutcome::DryRun { would_publish: feed.auto_publish });
    }

    if feed.auto_publish {
        match store.insert_published(Some(feed.id), &draft).await? {
            Some(id) => {
                info!("✅ [{}] Published \"{}\" as /{}", feed.name, draft.title, draft.slug);
                Ok(RouteOutcome::Published { id, slug: draft.slug })
            }
            None => Ok(RouteOutcome::Duplicate),
        }
    } else {
        match store.insert_pending(Some(feed.id), &draft).await? {
            Some(id) => {
                info!("📥 [{}] Queued \"{}\" for moderation", feed.name, draft.title);
                Ok(RouteOutcome::Queued { id, slug: draft.slug })
            }
            None => Ok(RouteOutcome::Duplicate),
        }
    }
}
