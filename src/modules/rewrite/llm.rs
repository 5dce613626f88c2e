use reqwest::Client;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;
use tracing::{debug, info};

use super::prompt::{build_user_prompt, SYSTEM_PROMPT};
use super::{ArticleRewriter, RewriteError, RewriteRequest};
use crate::config::ingest_profile::LlmConfig;
use crate::utils::http_client::{send_with_backoff, RetryPolicy};

/// Chat-completions client for an OpenAI-compatible gateway.
pub struct LlmRewriter {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
    policy: RetryPolicy,
}

impl LlmRewriter {
    pub fn new(client: Client, cfg: &LlmConfig) -> Self {
        Self {
            client,
            api_key: env::var("LLM_API_KEY").unwrap_or_default(),
            base_url: env::var("LLM_BASE_URL").unwrap_or("https://api.openai.com/v1".to_string()),
            model: env::var("LLM_MODEL").unwrap_or("gpt-4o-mini".to_string()),
            temperature: cfg.temperature,
            policy: RetryPolicy {
                max_attempts: cfg.max_attempts,
                backoff_base: Duration::from_millis(cfg.backoff_base_ms),
                backoff_max: Duration::from_millis(cfg.backoff_max_ms),
                pause: Duration::from_secs(3),
                retry_client_errors: true,
            },
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn call_llm(&self, sys_prompt: &str, user_prompt: &str) -> Result<String, RewriteError> {
        if self.api_key.is_empty() {
            return Err(RewriteError::MissingApiKey);
        }

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": sys_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "temperature": self.temperature,
            "response_format": {"type": "json_object"},
        });

        let request = self.client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);

        let resp = send_with_backoff(request, &self.policy, "llm").await?;
        let json_res: Value = resp.json().await.map_err(anyhow::Error::from)?;

        if let Some(usage) = json_res.get("usage") {
            debug!("🧮 LLM usage: {}", usage);
        }

        json_res["choices"][0]["message"]["content"]
            .as_str()
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string)
            .ok_or(RewriteError::EmptyCompletion)
    }
}

#[async_trait]
impl ArticleRewriter for LlmRewriter {
    async fn rewrite(&self, req: &RewriteRequest<'_>) -> Result<Value, RewriteError> {
        let user_prompt = build_user_prompt(req.item, req.source_text, req.default_category);
        info!("🧠 [{}] Rewriting \"{}\" ({} chars of source)", self.model, req.item.title, req.source_text.chars().count());

        let response = self.call_llm(SYSTEM_PROMPT, &user_prompt).await?;
        extract_json(&response).ok_or(RewriteError::NoJson)
    }
}

/// Removes `<think>...</think>` blocks emitted by reasoning models.
fn clean_reasoning_content(raw: &str) -> String {
    let mut clean = raw.to_string();
    while let Some(start) = clean.find("<think>") {
        match clean[start..].find("</think>") {
            Some(rel_end) => {
                let end = start + rel_end + "</think>".len();
                clean.replace_range(start..end, "");
            }
            None => {
                clean.truncate(start);
                break;
            }
        }
    }
    clean
}

/// Finds the JSON object in a completion: whole body, then a ```json fence,
/// then the outermost `{...}` span.
pub fn extract_json(raw_response: &str) -> Option<Value> {
    let cleaned = clean_reasoning_content(raw_response);
    let cleaned = cleaned.trim();

    let as_object = |s: &str| serde_json::from_str::<Value>(s).ok().filter(Value::is_object);

    if let Some(v) = as_object(cleaned) {
        return Some(v);
    }
    if let Some(start) = cleaned.find("```json") {
        let after_start = &cleaned[start + 7..];
        if let Some(end) = after_start.find("```") {
            if let Some(v) = as_object(after_start[..end].trim()) {
                return Some(v);
            }
        }
    }
    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if end > start {
            return as_object(&cleaned[start..=end]);
        }
    }
    None
}
