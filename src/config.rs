use std::{env, fmt::Display, str::FromStr};

use anyhow::{anyhow, Result};
use tracing::{info, warn};

/// Seconds allowed for a single page navigation.
pub const NAV_TIMEOUT_SECS: u64 = 45;

/// Seconds to poll for dynamically rendered trend content.
pub const DYNAMIC_CONTENT_TIMEOUT_SECS: u64 = 90;

/// Extra wait appended to the first run on a fresh browser profile so a
/// manual login can complete before extraction starts.
pub const LOGIN_GRACE_SECS: u64 = 120;

/// Interval between DOM polls while waiting for content.
pub const CONTENT_POLL_MS: u64 = 1500;

/// Primary CSS selector for trend keyword entries.
pub const TREND_PRIMARY_SELECTOR: &str = "ul.rank-list li .keyword";

/// Fallback selector used when the primary yields no elements.
pub const TREND_FALLBACK_SELECTOR: &str = ".trending-item .title";

/// Primary class marker for search-result titles.
pub const SEARCH_PRIMARY_MARKER: &str = "result__a";

/// Fallback marker used when the primary matches nothing.
pub const SEARCH_FALLBACK_MARKER: &str = "result-link";

/// Number of fortunes requested from the model per regeneration.
pub const FORTUNE_COUNT: usize = 30;

/// List-marker prefix that must never survive into a persisted fortune.
pub const FORTUNE_DISALLOWED_PREFIX: &str = "- ";

/// UTC hour at which the fortune list is regenerated.
pub const FORTUNE_REGEN_HOUR: u32 = 0;

/// Top-level configuration, loaded once at process start.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub mongo_url: String,
    pub mongo_db: String,
    pub ai_api_key: String,
    pub ai_api_base: String,
    pub gateway_url: String,
    pub gateway_token: String,
    pub gateway_chat_id: String,
    pub storage_base: String,
    pub storage_bucket: String,
    pub webdriver_url: String,
    pub browser_profile_dir: String,
    pub trend_url: String,
    pub search_url: String,
    pub sports_api_base: String,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Every missing required key is reported in a single diagnostic so an
    /// operator can fix the deployment in one pass instead of one restart
    /// per key.
    pub fn load() -> Result<Self> {
        let mut missing = Vec::new();

        let config = Self {
            port: optional("PORT", "8080"),
            mongo_url: required("MONGO_URL", &mut missing),
            mongo_db: optional("MONGO_DB", "arcade"),
            ai_api_key: required("OPENAI_API_KEY", &mut missing),
            ai_api_base: optional("OPENAI_API_BASE", "https://api.openai.com/v1"),
            gateway_url: optional("GATEWAY_URL", "https://api.telegram.org"),
            gateway_token: required("GATEWAY_TOKEN", &mut missing),
            gateway_chat_id: required("GATEWAY_CHAT_ID", &mut missing),
            storage_base: optional("STORAGE_BASE", "https://storage.googleapis.com"),
            storage_bucket: required("STORAGE_BUCKET", &mut missing),
            webdriver_url: optional("WEBDRIVER_URL", "http://127.0.0.1:9515"),
            browser_profile_dir: optional("BROWSER_PROFILE_DIR", "./.browser-profile"),
            trend_url: optional("TREND_URL", "https://trends.google.com/trending?geo=KR"),
            search_url: optional("SEARCH_URL", "https://html.duckduckgo.com/html/?q="),
            sports_api_base: optional(
                "SPORTS_API_BASE",
                "https://www.thesportsdb.com/api/v1/json/3",
            ),
        };

        if !missing.is_empty() {
            return Err(anyhow!(
                "missing required environment variables: {}",
                missing.join(", ")
            ));
        }

        info!(
            "configuration loaded, db={} port={}",
            config.mongo_db, config.port
        );
        Ok(config)
    }
}

fn required(key: &'static str, missing: &mut Vec<&'static str>) -> String {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => {
            missing.push(key);
            String::new()
        }
    }
}

fn optional<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().unwrap_or_else(|e| {
        warn!("invalid {key} value ({e}), using default: {default}");
        default.parse().ok().expect("default must parse")
    })
}
