// Shared test doubles: in-memory store, canned model, recording notifier,
// scripted browser. Not every binary uses every double.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use arcade_backend::config::{Config, TREND_PRIMARY_SELECTOR};
use arcade_backend::model::LanguageModel;
use arcade_backend::notify::Notifier;
use arcade_backend::scrape::{Browser, BrowserPage};
use arcade_backend::state::{AppState, SharedState};
use arcade_backend::store::ops::UpdateOp;
use arcade_backend::store::{DocumentStore, ScoreRecord, TrendSnapshot};

pub fn test_config() -> Config {
    Config {
        port: 0,
        mongo_url: "mongodb://unused:27017".into(),
        mongo_db: "test".into(),
        ai_api_key: "test-key".into(),
        ai_api_base: "http://127.0.0.1:1/v1".into(),
        gateway_url: "http://127.0.0.1:1".into(),
        gateway_token: "t".into(),
        gateway_chat_id: "c".into(),
        // Unroutable on purpose: best-effort archive must not block tests.
        storage_base: "http://127.0.0.1:1".into(),
        storage_bucket: "clips-test".into(),
        webdriver_url: "http://127.0.0.1:1".into(),
        browser_profile_dir: "./unused-profile".into(),
        trend_url: "http://127.0.0.1:1/trends".into(),
        search_url: "http://127.0.0.1:1/html/?q=".into(),
        sports_api_base: "http://127.0.0.1:1".into(),
    }
}

pub fn test_state(
    config: Config,
    store: Arc<dyn DocumentStore>,
    model: Arc<dyn LanguageModel>,
    notifier: Arc<dyn Notifier>,
) -> SharedState {
    Arc::new(AppState {
        config,
        store,
        model,
        notifier,
        http: reqwest::Client::new(),
    })
}

#[derive(Default)]
pub struct MemoryStore {
    pub scores: Mutex<Vec<ScoreRecord>>,
    pub fortunes: Mutex<Vec<String>>,
    pub snapshot: Mutex<Option<TrendSnapshot>>,
    pub updates: Mutex<Vec<String>>,
    pub fail_reads: AtomicBool,
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_score(&self, record: &ScoreRecord) -> Result<()> {
        self.scores.lock().push(record.clone());
        Ok(())
    }

    async fn top_scores(&self, game: &str) -> Result<Vec<ScoreRecord>> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(anyhow!("read refused"));
        }
        let mut list: Vec<ScoreRecord> = self
            .scores
            .lock()
            .iter()
            .filter(|r| r.game == game)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(list)
    }

    async fn replace_fortunes(&self, items: &[String]) -> Result<usize> {
        let mut fortunes = self.fortunes.lock();
        fortunes.clear();
        fortunes.extend(items.iter().cloned());
        Ok(items.len())
    }

    async fn save_trend_snapshot(&self, snapshot: &TrendSnapshot) -> Result<()> {
        *self.snapshot.lock() = Some(snapshot.clone());
        Ok(())
    }

    async fn apply_update(&self, op: &UpdateOp) -> Result<()> {
        self.updates.lock().push(op.collection().to_string());
        Ok(())
    }
}

pub struct StubModel {
    pub reply: String,
    pub stream_fragments: Vec<String>,
    pub transcript: String,
}

impl StubModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            stream_fragments: Vec::new(),
            transcript: String::new(),
        }
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Ok(self.reply.clone())
    }

    async fn complete_stream(&self, _prompt: &str) -> Result<mpsc::Receiver<Result<Bytes>>> {
        let (tx, rx) = mpsc::channel(8);
        let fragments = self.stream_fragments.clone();
        tokio::spawn(async move {
            for fragment in fragments {
                if tx.send(Ok(Bytes::from(fragment))).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }

    async fn transcribe(&self, _audio: Bytes) -> Result<String> {
        Ok(self.transcript.clone())
    }
}

#[derive(Default)]
pub struct StubNotifier {
    pub sent: Mutex<Vec<String>>,
    pub fail_containing: Option<String>,
}

#[async_trait]
impl Notifier for StubNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        if let Some(marker) = &self.fail_containing {
            if text.contains(marker.as_str()) {
                return Err(anyhow!("gateway rejected message"));
            }
        }
        self.sent.lock().push(text.to_string());
        Ok(())
    }
}

pub struct StubBrowser {
    pub primary: Vec<String>,
    pub fallback: Vec<String>,
    pub open_delay: Duration,
    pub opens: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
}

impl StubBrowser {
    pub fn with_primary(texts: &[&str]) -> Self {
        Self {
            primary: texts.iter().map(|t| t.to_string()).collect(),
            fallback: Vec::new(),
            open_delay: Duration::ZERO,
            opens: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Browser for StubBrowser {
    async fn open(&self) -> Result<Box<dyn BrowserPage>> {
        self.opens.fetch_add(1, Ordering::Relaxed);
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        Ok(Box::new(StubPage {
            primary: self.primary.clone(),
            fallback: self.fallback.clone(),
            closes: Arc::clone(&self.closes),
        }))
    }
}

pub struct StubPage {
    primary: Vec<String>,
    fallback: Vec<String>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserPage for StubPage {
    async fn goto(&self, _url: &str) -> Result<()> {
        Ok(())
    }

    async fn collect_texts(&self, selector: &str, _timeout: Duration) -> Result<Vec<String>> {
        if selector == TREND_PRIMARY_SELECTOR {
            Ok(self.primary.clone())
        } else {
            Ok(self.fallback.clone())
        }
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
