// Scheduler service. Owns the recurring-job loop handle: start() is
// duplicate-guarded, stop() is idempotent and halts future firings
// immediately. Overlapping trend runs are skipped, never queued, so the
// browser profile directory is opened by at most one session at a time.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::fortune::FortuneJob;
use super::trends::TrendScraper;
use crate::config::FORTUNE_REGEN_HOUR;
use crate::error::AppError;

pub struct Scheduler {
    scraper: Arc<TrendScraper>,
    fortunes: Arc<FortuneJob>,
    shutdown: CancellationToken,
    trend_gate: tokio::sync::Mutex<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(scraper: Arc<TrendScraper>, fortunes: Arc<FortuneJob>) -> Self {
        Self {
            scraper,
            fortunes,
            shutdown: CancellationToken::new(),
            trend_gate: tokio::sync::Mutex::new(()),
            handle: Mutex::new(None),
        }
    }

    /// Start the hourly loop. A second call while running is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut slot = self.handle.lock();
        if slot.is_some() {
            warn!("scheduler already started");
            return;
        }

        let scheduler = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            loop {
                let wait = until_next_hour(Utc::now());
                debug!("next scheduled tick in {:?}", wait);

                tokio::select! {
                    _ = scheduler.shutdown.cancelled() => {
                        debug!("scheduler loop exiting");
                        break;
                    }
                    _ = tokio::time::sleep(wait) => {}
                }

                if let Err(e) = scheduler.fire_once(Utc::now().hour()).await {
                    match e {
                        AppError::RunInProgress => {
                            warn!("previous trend run still active, tick skipped")
                        }
                        other => error!("scheduled trend run failed: {}", other),
                    }
                }
            }
        }));
    }

    /// One scheduled tick. The trend run is skipped with `RunInProgress`
    /// when the previous run still holds the profile guard.
    pub async fn fire_once(&self, hour: u32) -> Result<(), AppError> {
        let trend_result = match self.trend_gate.try_lock() {
            Ok(_guard) => self.scraper.run_once().await.map(|_| ()),
            Err(_) => Err(AppError::RunInProgress),
        };

        if hour == FORTUNE_REGEN_HOUR {
            if let Err(e) = self.fortunes.run_once().await {
                error!("fortune regeneration failed: {}", e);
            }
        }

        trend_result
    }

    /// Stop all future firings. Safe to call more than once; a run already
    /// in flight finishes (its own cleanup guarantees still apply).
    pub fn stop(&self) {
        self.shutdown.cancel();
        if self.handle.lock().take().is_some() {
            info!("scheduler stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.handle.lock().is_some()
    }
}

/// Wall-clock wait until the next top of the hour.
pub fn until_next_hour(now: DateTime<Utc>) -> Duration {
    let seconds_into_hour = u64::from(now.minute()) * 60 + u64::from(now.second());
    Duration::from_secs(3600 - seconds_into_hour)
}
