// Trend scrape run: navigate, wait for dynamic content, extract, summarize
// through the model, persist the snapshot. The browser session is closed on
// every exit path.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{
    DYNAMIC_CONTENT_TIMEOUT_SECS, LOGIN_GRACE_SECS, TREND_FALLBACK_SELECTOR,
    TREND_PRIMARY_SELECTOR,
};
use crate::error::AppError;
use crate::model::{parse_string_array, LanguageModel};
use crate::scrape::{Browser, BrowserPage};
use crate::store::{DocumentStore, TrendSnapshot};

pub struct TrendScraper {
    browser: Arc<dyn Browser>,
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn DocumentStore>,
    url: String,
    source_label: String,
}

impl TrendScraper {
    pub fn new(
        browser: Arc<dyn Browser>,
        model: Arc<dyn LanguageModel>,
        store: Arc<dyn DocumentStore>,
        url: String,
        source_label: &str,
    ) -> Self {
        Self {
            browser,
            model,
            store,
            url,
            source_label: source_label.to_string(),
        }
    }

    /// One full scrape run. Success persists a snapshot; any step failure is
    /// the run's failure, but the session close always happens.
    pub async fn run_once(&self) -> Result<TrendSnapshot, AppError> {
        let page = self
            .browser
            .open()
            .await
            .map_err(|e| AppError::upstream("browser", e))?;

        let outcome = self.run_steps(page.as_ref()).await;

        if let Err(e) = page.close().await {
            warn!("browser session close failed: {}", e);
        }

        outcome
    }

    async fn run_steps(&self, page: &dyn BrowserPage) -> Result<TrendSnapshot, AppError> {
        page.goto(&self.url)
            .await
            .map_err(|e| AppError::upstream("browser", e))?;

        let mut wait = Duration::from_secs(DYNAMIC_CONTENT_TIMEOUT_SECS);
        if page.is_fresh_profile() {
            info!(
                "fresh browser profile, extending first wait by {}s for manual login",
                LOGIN_GRACE_SECS
            );
            wait += Duration::from_secs(LOGIN_GRACE_SECS);
        }

        let mut texts = page
            .collect_texts(TREND_PRIMARY_SELECTOR, wait)
            .await
            .map_err(|e| AppError::upstream("browser", e))?;

        if texts.is_empty() {
            debug!("primary selector yielded nothing, trying fallback");
            texts = page
                .collect_texts(
                    TREND_FALLBACK_SELECTOR,
                    Duration::from_secs(DYNAMIC_CONTENT_TIMEOUT_SECS / 3),
                )
                .await
                .map_err(|e| AppError::upstream("browser", e))?;
        }

        // Partial extraction is usable; zero items is a hard failure.
        if texts.is_empty() {
            return Err(AppError::EmptyScrape);
        }

        let keywords = self.summarize(&texts).await?;

        let snapshot = TrendSnapshot {
            keywords,
            captured_at: Utc::now(),
            source: self.source_label.clone(),
        };
        self.store
            .save_trend_snapshot(&snapshot)
            .await
            .map_err(|e| AppError::upstream("database", e))?;

        info!(
            "trend snapshot persisted, {} keywords from {}",
            snapshot.keywords.len(),
            snapshot.source
        );
        Ok(snapshot)
    }

    async fn summarize(&self, texts: &[String]) -> Result<Vec<String>, AppError> {
        let prompt = format!(
            "These entries were scraped from a trending-topics page, ranked first \
             to last. Return the ranked keywords as a JSON array of strings, \
             nothing else.\n\n{}",
            texts.join("\n")
        );

        let reply = self
            .model
            .complete(&prompt)
            .await
            .map_err(|e| AppError::upstream("model", e))?;

        parse_string_array(&reply)
    }
}
