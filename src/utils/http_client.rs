use reqwest::{Client, RequestBuilder, Response, StatusCode};
use reqwest::header::RETRY_AFTER;
use std::time::Duration;
use anyhow::{anyhow, Context, Result};
use tokio::time::sleep;
use tracing::{info, warn};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36 feed_ingest/1.4";

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// General client for feeds and article pages.
    pub fn create() -> Result<Client> {
        let builder = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::limited(5))
            .tcp_keepalive(Some(Duration::from_secs(30)));

        info!("🌐 [Http Client] feed/page client ready");

        let client = builder.build()?;
        Ok(client)
    }

    /// Client for the LLM gateway. Completions on long articles can take minutes.
    pub fn create_llm() -> Result<Client> {
        let builder = Client::builder()
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(30))
            .http1_only();

        let client = builder.build()?;
        Ok(client)
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// First delay after a 429 when the server sends no `Retry-After`.
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Pause after transport errors and 5xx responses.
    pub pause: Duration,
    /// Also retry 4xx (other than 429) with `pause` instead of failing at once.
    pub retry_client_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
            backoff_max: Duration::from_secs(60),
            pause: Duration::from_secs(3),
            retry_client_errors: false,
        }
    }
}

impl RetryPolicy {
    /// `base * 2^(attempt-1)`, capped at `backoff_max`. `attempt` starts at 1.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.backoff_base.saturating_mul(1u32 << exp);
        delay.min(self.backoff_max)
    }
}

/// Parses a delta-seconds `Retry-After`. HTTP-date values are ignored.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn retry_after(resp: &Response) -> Option<Duration> {
    resp.headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
}

/// Sends `request`, retrying 429 with backoff and 5xx/transport failures with a
/// fixed pause. Other 4xx responses fail immediately unless
/// `policy.retry_client_errors` is set.
pub async fn send_with_backoff(request: RequestBuilder, policy: &RetryPolicy, label: &str) -> Result<Response> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = anyhow!("{} was never attempted", label);

    for attempt in 1..=attempts {
        let req = request
            .try_clone()
            .context("request body cannot be retried")?;

        match req.send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return Ok(resp);
                }

                if status == StatusCode::TOO_MANY_REQUESTS {
                    let delay = retry_after(&resp)
                        .unwrap_or_else(|| policy.backoff_delay(attempt))
                        .min(policy.backoff_max);
                    warn!("⏳ {} rate limited (Attempt {}/{}). Backing off {}s", label, attempt, attempts, delay.as_secs());
                    last_error = anyhow!("{} rate limited (HTTP 429)", label);
                    if attempt < attempts {
                        sleep(delay).await;
                    }
                    continue;
                }

                let body = resp.text().await.unwrap_or_default();
                let snippet: String = body.chars().take(300).collect();
                if status.is_server_error() || policy.retry_client_errors {
                    warn!("⚠️ {} HTTP {} (Attempt {}/{}): {}", label, status, attempt, attempts, snippet);
                    last_error = anyhow!("{} HTTP {}: {}", label, status, snippet);
                    if attempt < attempts {
                        sleep(policy.pause).await;
                    }
                    continue;
                }

                return Err(anyhow!("{} HTTP {}: {}", label, status, snippet));
            }
            Err(e) => {
                warn!("⚠️ {} Network Error (Attempt {}/{}): {}", label, attempt, attempts, e);
                last_error = anyhow!("{} network error: {}", label, e);
                if attempt < attempts {
                    sleep(policy.pause).await;
                }
            }
        }
    }

    Err(last_error.context(format!("{} failed after {} attempts", label, attempts)))
}
