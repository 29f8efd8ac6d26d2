// WebDriver-protocol client. The automation endpoint (chromedriver) is
// consumed as a black box through its REST surface; this wrapper adds only
// JSON reshaping and per-step timeouts.

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{Browser, BrowserPage};
use crate::config::{CONTENT_POLL_MS, NAV_TIMEOUT_SECS};

pub struct WebDriverBrowser {
    client: reqwest::Client,
    base: String,
    profile_dir: String,
}

impl WebDriverBrowser {
    pub fn new(base: &str, profile_dir: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(NAV_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            profile_dir: profile_dir.to_string(),
        }
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    async fn open(&self) -> Result<Box<dyn BrowserPage>> {
        // Login/cookie state lives in the profile directory and survives
        // across runs; a missing directory means no prior login.
        let fresh_profile = !Path::new(&self.profile_dir).exists();

        let caps = json!({
            "capabilities": {
                "alwaysMatch": {
                    "goog:chromeOptions": {
                        "args": [
                            format!("--user-data-dir={}", self.profile_dir),
                            "--no-first-run",
                            "--disable-gpu",
                        ],
                    },
                },
            },
        });

        let resp = self
            .client
            .post(format!("{}/session", self.base))
            .json(&caps)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("session create failed: HTTP {}", status.as_u16()));
        }

        let body: Value = resp.json().await?;
        let session_id = body["value"]["sessionId"]
            .as_str()
            .ok_or_else(|| anyhow!("session create reply had no sessionId"))?
            .to_string();

        info!(
            "browser session {} opened, fresh_profile={}",
            session_id, fresh_profile
        );

        Ok(Box::new(WebDriverPage {
            client: self.client.clone(),
            base: self.base.clone(),
            session_id,
            fresh_profile,
        }))
    }
}

pub struct WebDriverPage {
    client: reqwest::Client,
    base: String,
    session_id: String,
    fresh_profile: bool,
}

impl WebDriverPage {
    fn session_url(&self, path: &str) -> String {
        format!("{}/session/{}{}", self.base, self.session_id, path)
    }

    /// One non-waiting DOM query: element ids for `selector`, then the text
    /// of each.
    async fn element_texts(&self, selector: &str) -> Result<Vec<String>> {
        let resp = self
            .client
            .post(self.session_url("/elements"))
            .json(&json!({ "using": "css selector", "value": selector }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("element query failed: HTTP {}", status.as_u16()));
        }

        let body: Value = resp.json().await?;
        let empty = Vec::new();
        let elements = body["value"].as_array().unwrap_or(&empty);

        let mut texts = Vec::with_capacity(elements.len());
        for element in elements {
            // W3C element ids arrive keyed by a fixed GUID field.
            let Some(id) = element
                .as_object()
                .and_then(|o| o.values().next())
                .and_then(Value::as_str)
            else {
                continue;
            };

            let resp = self
                .client
                .get(self.session_url(&format!("/element/{id}/text")))
                .send()
                .await?;
            if !resp.status().is_success() {
                continue;
            }
            let body: Value = resp.json().await?;
            if let Some(text) = body["value"].as_str() {
                let text = text.trim();
                if !text.is_empty() {
                    texts.push(text.to_string());
                }
            }
        }

        Ok(texts)
    }
}

#[async_trait]
impl BrowserPage for WebDriverPage {
    async fn goto(&self, url: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.session_url("/url"))
            .json(&json!({ "url": url }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("navigation failed: HTTP {}", status.as_u16()));
        }
        debug!("session {} navigated to {}", self.session_id, url);
        Ok(())
    }

    async fn collect_texts(&self, selector: &str, timeout: Duration) -> Result<Vec<String>> {
        let deadline = Instant::now() + timeout;

        loop {
            match self.element_texts(selector).await {
                Ok(texts) if !texts.is_empty() => return Ok(texts),
                Ok(_) => {}
                Err(e) => debug!("element poll failed, will retry: {}", e),
            }

            if Instant::now() >= deadline {
                warn!(
                    "timed out waiting for selector {:?} after {:?}",
                    selector, timeout
                );
                return Ok(Vec::new());
            }

            tokio::time::sleep(Duration::from_millis(CONTENT_POLL_MS)).await;
        }
    }

    async fn close(&self) -> Result<()> {
        let resp = self
            .client
            .delete(self.session_url(""))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("session delete failed: HTTP {}", status.as_u16()));
        }
        info!("browser session {} closed", self.session_id);
        Ok(())
    }

    fn is_fresh_profile(&self) -> bool {
        self.fresh_profile
    }
}
