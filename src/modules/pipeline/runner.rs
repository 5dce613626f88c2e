use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::report::RunReport;
use super::PipelineError;
use crate::config::ingest_profile::PipelineConfig;
use crate::modules::ingest::content::html_to_text;
use crate::modules::ingest::{FeedItem, FeedReader, FeedSource, PageSource};
use crate::modules::publish::{route, ArticleStore, RouteOutcome};
use crate::modules::rewrite::{ArticleRewriter, RewriteRequest};
use crate::modules::validation::{validate_article, ValidationContext};
use crate::utils::notifier::EditorialNotifier;

/// feed → items → page text → LLM → schema → articles / moderation queue
pub struct Pipeline {
    reader: FeedReader,
    pages: Arc<dyn PageSource>,
    rewriter: Arc<dyn ArticleRewriter>,
    store: Arc<dyn ArticleStore>,
    notifier: Option<Arc<EditorialNotifier>>,
    cfg: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        reader: FeedReader,
        pages: Arc<dyn PageSource>,
        rewriter: Arc<dyn ArticleRewriter>,
        store: Arc<dyn ArticleStore>,
        notifier: Option<Arc<EditorialNotifier>>,
        cfg: PipelineConfig,
    ) -> Self {
        Self { reader, pages, rewriter, store, notifier, cfg }
    }

    pub async fn run_batch(&self, feeds: &[FeedSource]) -> RunReport {
        let mut total = RunReport::start(None, "batch", self.cfg.dry_run);
        for feed in feeds {
            let report = self.run_feed(feed).await;
            total.absorb(&report);
        }
        info!("🏁 Batch done over {} feed(s): {}", feeds.len(), total);
        total
    }

    pub async fn run_feed(&self, feed: &FeedSource) -> RunReport {
        let mut report = RunReport::start(Some(feed.id), &feed.name, self.cfg.dry_run);

        match self.reader.fetch_items(feed).await {
            Ok(items) => self.process_items(feed, items, &mut report).await,
            Err(e) => {
                error!("❌ [{}] Feed fetch failed: {:#}", feed.name, e);
                report.record_failure(&feed.url, format!("{:#}", e));
                if let Some(notifier) = &self.notifier {
                    notifier.send_alert(&format!("Feed {} falhou: {:#}", feed.name, e)).await;
                }
            }
        }

        self.finish(&report).await;
        report
    }

    /// Runs every item through the pipeline. Item failures are counted, never propagated.
    pub async fn process_items(&self, feed: &FeedSource, items: Vec<FeedItem>, report: &mut RunReport) {
        report.fetched += items.len();
        let gap = Duration::from_millis(self.cfg.item_gap_ms);
        let mut llm_calls = 0usize;

        for item in &items {
            // Checked before the LLM call so known items cost nothing.
            match self.store.source_exists(&item.link).await {
                Ok(true) => {
                    report.duplicates += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("⚠️ [{}] Duplicate check failed for {}: {:#}", feed.name, item.link, e);
                    report.record_failure(&item.link, format!("{:#}", e));
                    continue;
                }
            }

            if llm_calls > 0 && !gap.is_zero() {
                sleep(gap).await;
            }
            llm_calls += 1;

            match self.process_item(feed, item).await {
                Ok(RouteOutcome::Published { .. }) => report.published += 1,
                Ok(RouteOutcome::Queued { .. }) => report.queued += 1,
                Ok(RouteOutcome::Duplicate) => report.duplicates += 1,
                Ok(RouteOutcome::DryRun { would_publish: true }) => report.published += 1,
                Ok(RouteOutcome::DryRun { would_publish: false }) => report.queued += 1,
                Err(e) => {
                    warn!("⚠️ [{}] Item failed ({}): {:#}", feed.name, item.link, e);
                    report.record_failure(&item.link, format!("{:#}", e));
                }
            }
        }
    }

    pub async fn process_item(&self, feed: &FeedSource, item: &FeedItem) -> Result<RouteOutcome> {
        let source_text = self.source_text(item).await?;

        let request = RewriteRequest {
            item,
            source_text: &source_text,
            default_category: feed.default_category.as_deref(),
        };
        let raw = self.rewriter.rewrite(&request).await?;

        let ctx = ValidationContext {
            source_url: &item.link,
            source_published_at: item.pub_date,
            default_category: feed.default_category.as_deref(),
            feed_image: item.image_url.as_deref(),
        };
        let draft = validate_article(&raw, &ctx)?;

        route(self.store.as_ref(), feed, draft, self.cfg.dry_run).await
    }

    /// Page text, or the feed description when the page is unreachable or too thin.
    async fn source_text(&self, item: &FeedItem) -> Result<String, PipelineError> {
        let min = self.cfg.min_content_chars;
        match self.pages.fetch_text(&item.link).await {
            Ok(text) if text.chars().count() >= min => return Ok(text),
            Ok(text) => info!("📄 Page text too short ({} chars) for {}, using feed description", text.chars().count(), item.link),
            Err(e) => warn!("⚠️ Page fetch failed for {}: {:#}. Using feed description", item.link, e),
        }

        let fallback = html_to_text(&item.description, self.cfg.max_content_chars);
        let chars = fallback.chars().count();
        if chars >= min {
            Ok(fallback)
        } else {
            Err(PipelineError::ContentTooShort { chars, min })
        }
    }

    async fn finish(&self, report: &RunReport) {
        info!("📊 {}", report);
        if let Err(e) = self.store.record_run(report).await {
            warn!("⚠️ Could not record import run for {}: {:#}", report.feed_name, e);
        }
        if !report.dry_run {
            if let Some(notifier) = &self.notifier {
                notifier.notify_queued(report).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::publish::store::memory::MemoryStore;
    use crate::modules::rewrite::RewriteError;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use crate::utils::test_server::{reply, test_client, TestServer};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use uuid::Uuid;

    struct StubPages(HashMap<String, String>);

    #[async_trait]
    impl PageSource for StubPages {
        async fn fetch_text(&self, url: &str) -> Result<String> {
            self.0.get(url).cloned().ok_or_else(|| anyhow!("HTTP 404"))
        }
    }

    /// Echoes the source title back inside an otherwise valid article.
    struct StubRewriter {
        broken_for: Option<String>,
    }

    #[async_trait]
    impl ArticleRewriter for StubRewriter {
        async fn rewrite(&self, req: &RewriteRequest<'_>) -> Result<Value, RewriteError> {
            if self.broken_for.as_deref() == Some(req.item.link.as_str()) {
                return Ok(json!({ "title": "x" }));
            }
            let tags: Vec<String> = (0..12).map(|i| format!("tag{}", i)).collect();
            Ok(json!({
                "title": format!("Reescrita: {}", req.item.title),
                "summary": "Resumo suficientemente longo para passar pela regra de tamanho mínimo.",
                "content": "Texto reescrito da matéria. ".repeat(20),
                "category": req.default_category.unwrap_or("brasil"),
                "tags": tags,
            }))
        }
    }

    fn cfg(dry_run: bool) -> PipelineConfig {
        PipelineConfig { dry_run, item_gap_ms: 0, min_content_chars: 40, ..PipelineConfig::default() }
    }

    fn feed(auto_publish: bool) -> FeedSource {
        FeedSource {
            id: Uuid::new_v4(),
            name: "Fonte".to_string(),
            url: "https://fonte.example.com/rss".to_string(),
            enabled: true,
            auto_publish,
            default_category: Some("economia".to_string()),
            max_items: 10,
        }
    }

    fn item(n: u32, description: &str) -> FeedItem {
        FeedItem {
            title: format!("Notícia número {}", n),
            link: format!("https://fonte.example.com/noticia-{}", n),
            description: description.to_string(),
            pub_date: None,
            image_url: None,
        }
    }

    fn pipeline(store: Arc<MemoryStore>, pages: HashMap<String, String>, broken_for: Option<&str>, dry_run: bool) -> Pipeline {
        Pipeline::new(
            FeedReader::new(test_client()),
            Arc::new(StubPages(pages)),
            Arc::new(StubRewriter { broken_for: broken_for.map(str::to_string) }),
            store,
            None,
            cfg(dry_run),
        )
    }

    fn long_text() -> String {
        "Conteúdo completo da página de origem. ".repeat(3)
    }

    #[tokio::test]
    async fn publishes_new_items_and_skips_known_ones() {
        let store = Arc::new(MemoryStore::default());
        let pages: HashMap<_, _> = (1..=2).map(|n| (item(n, "").link, long_text())).collect();
        let p = pipeline(store.clone(), pages, None, false);
        let f = feed(true);

        let mut first = RunReport::start(Some(f.id), &f.name, false);
        p.process_items(&f, vec![item(1, ""), item(2, "")], &mut first).await;
        assert_eq!((first.fetched, first.published, first.duplicates, first.failed), (2, 2, 0, 0));

        let mut second = RunReport::start(Some(f.id), &f.name, false);
        p.process_items(&f, vec![item(1, ""), item(2, "")], &mut second).await;
        assert_eq!((second.fetched, second.published, second.duplicates), (2, 0, 2));

        let published = store.published.lock().await;
        assert_eq!(published[0].1.title, "Reescrita: Notícia número 1");
        assert_eq!(published[0].1.category, "economia");
        assert_eq!(published[0].1.source_url, "https://fonte.example.com/noticia-1");
    }

    #[tokio::test]
    async fn unreachable_pages_fall_back_to_the_description() {
        let store = Arc::new(MemoryStore::default());
        let p = pipeline(store.clone(), HashMap::new(), None, false);
        let f = feed(false);

        let rich = format!("<p>{}</p>", long_text());
        let mut report = RunReport::start(Some(f.id), &f.name, false);
        p.process_items(&f, vec![item(1, &rich), item(2, "<p>curto</p>")], &mut report).await;

        assert_eq!(report.queued, 1);
        assert_eq!(report.failed, 1);
        assert!(report.errors[0].contains("too short"));
        assert_eq!(store.pending.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn invalid_llm_output_is_counted_as_failure() {
        let store = Arc::new(MemoryStore::default());
        let pages: HashMap<_, _> = (1..=2).map(|n| (item(n, "").link, long_text())).collect();
        let p = pipeline(store.clone(), pages, Some("https://fonte.example.com/noticia-2"), false);
        let f = feed(true);

        let mut report = RunReport::start(Some(f.id), &f.name, false);
        p.process_items(&f, vec![item(1, ""), item(2, "")], &mut report).await;

        assert_eq!(report.published, 1);
        assert_eq!(report.failed, 1);
        assert!(report.errors[0].contains("article failed validation"));
    }

    #[tokio::test]
    async fn dry_run_counts_without_writing() {
        let store = Arc::new(MemoryStore::default());
        let pages: HashMap<_, _> = [(item(1, "").link, long_text())].into_iter().collect();
        let p = pipeline(store.clone(), pages, None, true);
        let f = feed(false);

        let mut report = RunReport::start(Some(f.id), &f.name, true);
        p.process_items(&f, vec![item(1, "")], &mut report).await;
        assert_eq!(report.queued, 1);
        assert!(store.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn escaped_description_fallback_is_plain_text() {
        let store = Arc::new(MemoryStore::default());
        let p = pipeline(store, HashMap::new(), None, false);

        // 60+ raw chars but only 12 chars of text
        let thin = item(1, "&lt;p&gt;curto demais&lt;/p&gt;&lt;img src=&quot;https://x.example.com/a.jpg&quot;&gt;");
        let err = p.source_text(&thin).await.unwrap_err();
        assert!(matches!(err, PipelineError::ContentTooShort { chars: 12, .. }));

        let escaped = format!("&lt;p&gt;{}&lt;/p&gt;", long_text());
        let text = p.source_text(&item(2, &escaped)).await.unwrap();
        assert_eq!(text, long_text().trim());
    }

    #[tokio::test]
    async fn failed_feed_fetch_is_reported_and_recorded() {
        let server = TestServer::start(vec![reply("404 Not Found", "gone")]).await;
        let store = Arc::new(MemoryStore::default());
        let p = pipeline(store.clone(), HashMap::new(), None, false);
        let f = FeedSource { url: server.url(), ..feed(true) };

        let report = p.run_feed(&f).await;
        assert_eq!((report.fetched, report.failed), (0, 1));
        assert!(report.errors[0].starts_with(&server.url()));
        assert!(report.errors[0].contains("HTTP 404"));

        let runs = store.runs.lock().await;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].feed_id, Some(f.id));
        assert_eq!(runs[0].failed, 1);
    }

    #[tokio::test]
    async fn run_feed_processes_the_feed_and_records_the_run() {
        let rss = r#"<?xml version="1.0"?><rss><channel>
            <item><title>Primeira</title><link>https://fonte.example.com/noticia-1</link></item>
            <item><title>Segunda</title><link>https://fonte.example.com/noticia-2</link></item>
            </channel></rss>"#;
        let server = TestServer::start(vec![reply("200 OK", rss)]).await;
        let store = Arc::new(MemoryStore::default());
        let pages: HashMap<_, _> = [(item(1, "").link, long_text())].into_iter().collect();
        let p = pipeline(store.clone(), pages, None, false);
        let f = FeedSource { url: server.url(), ..feed(true) };

        let report = p.run_feed(&f).await;
        // noticia-2 has no page and no description
        assert_eq!((report.fetched, report.published, report.failed), (2, 1, 1));

        let runs = store.runs.lock().await;
        assert_eq!(runs.len(), 1);
        assert_eq!(*runs, vec![report.clone()]);
        assert_eq!(store.published.lock().await[0].1.title, "Reescrita: Primeira");
    }

    #[tokio::test]
    async fn batch_sums_feed_reports() {
        let server = TestServer::start(vec![reply("404 Not Found", "")]).await;
        let store = Arc::new(MemoryStore::default());
        let p = pipeline(store.clone(), HashMap::new(), None, false);
        let feeds = vec![
            FeedSource { url: server.url(), ..feed(true) },
            FeedSource { url: server.url(), ..feed(false) },
        ];

        let total = p.run_batch(&feeds).await;
        assert_eq!(total.feed_id, None);
        assert_eq!(total.failed, 2);
        assert_eq!(store.runs.lock().await.len(), 2);
    }
}
