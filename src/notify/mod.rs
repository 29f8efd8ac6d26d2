// Messaging-gateway client. One notification per scraped match, fanned out
// concurrently and awaited as a group.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

pub struct GatewayNotifier {
    client: reqwest::Client,
    base: String,
    token: String,
    chat_id: String,
}

impl GatewayNotifier {
    pub fn new(base: &str, token: &str, chat_id: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for GatewayNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base, self.token);
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "chat_id": self.chat_id, "text": text }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("gateway rejected message: HTTP {}", status.as_u16()));
        }
        debug!("notification delivered ({} chars)", text.len());
        Ok(())
    }
}

/// Send one notification per item and wait for the whole group.
///
/// Returns `(index, error)` for every failed send instead of dropping them.
pub async fn notify_all(notifier: &dyn Notifier, items: &[String]) -> Vec<(usize, String)> {
    let sends = items.iter().map(|text| notifier.send(text));
    let results = futures::future::join_all(sends).await;

    results
        .into_iter()
        .enumerate()
        .filter_map(|(index, result)| result.err().map(|e| (index, e.to_string())))
        .collect()
}
