use reqwest::Client;
use serde_json::json;
use std::env;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use url::form_urlencoded;

use crate::modules::pipeline::RunReport;

/// Posts editorial notices (new items waiting for moderation, failing feeds)
/// to a chat webhook. Silent when `EDITORIAL_WEBHOOK` is unset.
pub struct EditorialNotifier {
    client: Client,
    webhook_url: String,
    secret: String,
}

impl EditorialNotifier {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            webhook_url: env::var("EDITORIAL_WEBHOOK").unwrap_or_default(),
            secret: env::var("EDITORIAL_SECRET").unwrap_or_default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.webhook_url.is_empty()
    }

    /// Appends `timestamp` and `sign` (base64 HMAC-SHA256 of `"{timestamp}\n{secret}"`).
    fn signed_url(&self, timestamp_ms: u128) -> String {
        if self.secret.is_empty() {
            return self.webhook_url.clone();
        }

        let string_to_sign = format!("{}\n{}", timestamp_ms, self.secret);
        let mut mac = match Hmac::<Sha256>::new_from_slice(self.secret.as_bytes()) {
            Ok(mac) => mac,
            Err(e) => {
                error!("❌ Webhook signing failed: {}", e);
                return self.webhook_url.clone();
            }
        };
        mac.update(string_to_sign.as_bytes());
        let signature = general_purpose::STANDARD.encode(mac.finalize().into_bytes());
        let encoded: String = form_urlencoded::byte_serialize(signature.as_bytes()).collect();

        let sep = if self.webhook_url.contains('?') { '&' } else { '?' };
        format!("{}{}timestamp={}&sign={}", self.webhook_url, sep, timestamp_ms, encoded)
    }

    async fn send(&self, body: &serde_json::Value) {
        if !self.is_enabled() {
            return;
        }

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let url = self.signed_url(timestamp);

        match self.client.post(&url).json(body).send().await {
            Ok(resp) => {
                let status = resp.status();
                if !status.is_success() {
                    let text = resp.text().await.unwrap_or_default();
                    error!("❌ Webhook HTTP {}: {}", status, text);
                } else {
                    debug!("Webhook delivered");
                }
            }
            Err(e) => error!("❌ Webhook Network Error: {}", e),
        }
    }

    async fn send_markdown(&self, title: &str, text: &str) {
        let body = json!({
            "msgtype": "markdown",
            "markdown": {
                "title": title,
                "text": text
            }
        });
        self.send(&body).await;
    }

    pub async fn notify_queued(&self, report: &RunReport) {
        if report.queued == 0 {
            return;
        }
        let title = format!("📥 {} matéria(s) aguardando revisão", report.queued);
        self.send_markdown(&title, &format_queue_notice(report)).await;
    }

    pub async fn send_alert(&self, content: &str) {
        let body = json!({
            "msgtype": "text",
            "text": {
                "content": format!("⚠️ [Importador RSS]\n{}", content)
            }
        });
        self.send(&body).await;
    }
}

pub fn format_queue_notice(report: &RunReport) -> String {
    let mut text = format!(
        "### Importação: {}\n\n\
        - **Na fila de moderação**: {}\n\
        - **Publicadas**: {}\n\
        - **Duplicadas**: {}\n\
        - **Falhas**: {}\n",
        report.feed_name, report.queued, report.published, report.duplicates, report.failed
    );
    if !report.errors.is_empty() {
        text.push_str("\n**Erros recentes**:\n");
        for e in report.errors.iter().take(3) {
            text.push_str(&format!("> {}\n", e));
        }
    }
    text
}
