// Scraping layer: browser-automation trait seam, WebDriver client, and the
// plain-HTML text extractor.

pub mod extract;
pub mod webdriver;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Browser: Send + Sync {
    /// Open a browser session. The caller owns the returned page and must
    /// close it on every exit path.
    async fn open(&self) -> Result<Box<dyn BrowserPage>>;
}

#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&self, url: &str) -> Result<()>;

    /// Poll for elements matching `selector` until `timeout`. A timeout is
    /// recoverable: it reports as `Ok(vec![])` so the caller can fall back.
    async fn collect_texts(&self, selector: &str, timeout: Duration) -> Result<Vec<String>>;

    async fn close(&self) -> Result<()>;

    /// Whether this session started from a profile directory with no prior
    /// login state.
    fn is_fresh_profile(&self) -> bool {
        false
    }
}
