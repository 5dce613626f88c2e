pub mod prompt;
pub mod llm;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::modules::ingest::FeedItem;

pub use llm::LlmRewriter;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("LLM_API_KEY is not set")]
    MissingApiKey,
    #[error("completion carried no content")]
    EmptyCompletion,
    #[error("no JSON object found in completion")]
    NoJson,
    #[error(transparent)]
    Request(#[from] anyhow::Error),
}

pub struct RewriteRequest<'a> {
    pub item: &'a FeedItem,
    pub source_text: &'a str,
    pub default_category: Option<&'a str>,
}

/// Turns source material into an article object following the portal schema.
/// The returned value is unvalidated.
#[async_trait]
pub trait ArticleRewriter: Send + Sync {
    async fn rewrite(&self, req: &RewriteRequest<'_>) -> Result<Value, RewriteError>;
}
