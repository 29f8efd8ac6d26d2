use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use arcade_backend::config::Config;
use arcade_backend::jobs::{fortune::FortuneJob, scheduler::Scheduler, trends::TrendScraper};
use arcade_backend::scrape::webdriver::WebDriverBrowser;
use arcade_backend::server::handler::ApiServer;
use arcade_backend::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let config = Config::load()?;
    let state = AppState::connect(config).await?;

    let browser = Arc::new(WebDriverBrowser::new(
        &state.config.webdriver_url,
        &state.config.browser_profile_dir,
    ));
    let scraper = Arc::new(TrendScraper::new(
        browser,
        state.model.clone(),
        state.store.clone(),
        state.config.trend_url.clone(),
        "trend-page",
    ));
    let fortunes = Arc::new(FortuneJob::new(state.model.clone(), state.store.clone()));

    let scheduler = Arc::new(Scheduler::new(scraper, fortunes));
    scheduler.start();

    let server = ApiServer::start(state.clone(), state.config.port).await?;
    info!("listening on port {}", server.port());

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    scheduler.stop();
    server.shutdown();
    Ok(())
}
