use reqwest::Client;
use reqwest::header::ACCEPT;
use anyhow::{bail, Context, Result};
use std::time::Duration;
use tracing::{debug, info};

use super::extractor::extract_items;
use super::structs::{FeedItem, FeedSource};
use crate::utils::http_client::{send_with_backoff, RetryPolicy};

const FEED_ACCEPT: &str = "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.9, */*;q=0.5";

pub struct FeedReader {
    client: Client,
    policy: RetryPolicy,
}

impl FeedReader {
    pub fn new(client: Client) -> Self {
        Self { client, policy: RetryPolicy::default() }
    }

    /// Downloads the raw feed document.
    pub async fn fetch_xml(&self, url: &str) -> Result<String> {
        let request = self.client
            .get(url)
            .header(ACCEPT, FEED_ACCEPT)
            .timeout(Duration::from_secs(20));

        let resp = send_with_backoff(request, &self.policy, "feed").await
            .with_context(|| format!("fetching feed {}", url))?;
        let body = resp.text().await.context("reading feed body")?;

        let cleaned = trim_feed_prefix(&body);
        if cleaned.is_empty() {
            bail!("feed {} returned an empty body", url);
        }
        debug!("📡 Feed {} returned {} bytes", url, cleaned.len());
        Ok(cleaned.to_string())
    }

    pub async fn fetch_items(&self, feed: &FeedSource) -> Result<Vec<FeedItem>> {
        let xml = self.fetch_xml(&feed.url).await?;
        let items = extract_items(&xml, feed.item_limit());
        info!("📰 [{}] {} item(s) extracted", feed.name, items.len());
        Ok(items)
    }
}

/// Drops a BOM and anything before the XML declaration or root element.
pub fn trim_feed_prefix(body: &str) -> &str {
    let body = body.trim_start_matches('\u{FEFF}').trim();
    ["<?xml", "<rss", "<feed", "<rdf:RDF"]
        .iter()
        .filter_map(|marker| body.find(marker))
        .min()
        .map(|start| &body[start..])
        .unwrap_or(body)
}
