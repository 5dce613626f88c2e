use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

use super::text::{decode_entities, strip_tags, tidy_paragraphs, truncate_chars};
use super::PageSource;
use crate::utils::http_client::{send_with_backoff, RetryPolicy};

const NOISE_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "iframe", "svg",
];

static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    NOISE_TAGS
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).unwrap())
        .collect()
});
// Greedy on purpose: first opening tag to last closing tag.
static ARTICLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<article\b[^>]*>(.*)</article\s*>").unwrap());
static MAIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<main\b[^>]*>(.*)</main\s*>").unwrap());
static BODY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<body\b[^>]*>(.*)</body\s*>").unwrap());
static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(?:p|div|li|h[1-6]|blockquote|tr|section|figcaption)\s*>").unwrap()
});

/// Downloads article pages and reduces them to plain text.
pub struct ContentFetcher {
    client: Client,
    policy: RetryPolicy,
    max_chars: usize,
}

impl ContentFetcher {
    pub fn new(client: Client, max_chars: usize) -> Self {
        Self { client, policy: RetryPolicy::default(), max_chars }
    }

    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        let request = self.client
            .get(url)
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "pt-BR,pt;q=0.9,en;q=0.5")
            .timeout(Duration::from_secs(25));

        let resp = send_with_backoff(request, &self.policy, "article page").await
            .with_context(|| format!("fetching article {}", url))?;
        resp.text().await.context("reading article body")
    }
}

#[async_trait]
impl PageSource for ContentFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let html = self.fetch_html(url).await?;
        Ok(html_to_text(&html, self.max_chars))
    }
}

/// Plain text of the main content of an HTML document, at most `max_chars` chars.
pub fn html_to_text(html: &str, max_chars: usize) -> String {
    // Feed descriptions often arrive with their markup escaped.
    let unescaped;
    let html = if !html.contains('<') && html.contains("&lt;") {
        unescaped = decode_entities(html);
        unescaped.as_str()
    } else {
        html
    };

    let mut doc = COMMENT.replace_all(html, "").into_owned();
    for re in NOISE.iter() {
        doc = re.replace_all(&doc, "").into_owned();
    }

    let container = [&ARTICLE, &MAIN, &BODY]
        .iter()
        .find_map(|re| re.captures(&doc).and_then(|c| c.get(1)).map(|m| m.as_str().to_string()))
        .unwrap_or_else(|| doc.clone());

    let with_breaks = BLOCK_BREAK.replace_all(&container, "\n");
    let text = tidy_paragraphs(&decode_entities(&strip_tags(&with_breaks)));
    truncate_chars(&text, max_chars)
}
