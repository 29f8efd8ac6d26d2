// Scheduled jobs: hourly trend scrape, daily fortune regeneration, and the
// scheduler service that owns their lifecycle.

pub mod fortune;
pub mod scheduler;
pub mod trends;
