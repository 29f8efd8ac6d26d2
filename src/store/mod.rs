// Document-store layer: record types, trait seam, MongoDB implementation.

pub mod mongo;
pub mod ops;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use self::ops::UpdateOp;

/// A submitted game score. Inserted on submission, read back sorted by
/// score descending; never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub game: String,
    pub name: String,
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

/// The latest trend ranking. One shared record, overwritten each run;
/// history is not retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSnapshot {
    pub keywords: Vec<String>,
    pub captured_at: DateTime<Utc>,
    pub source: String,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_score(&self, record: &ScoreRecord) -> Result<()>;

    /// Full leaderboard for one game, sorted non-increasing by score.
    async fn top_scores(&self, game: &str) -> Result<Vec<ScoreRecord>>;

    /// Wholesale replacement: delete-all then bulk-insert. Not transactional;
    /// a mid-way failure leaves the list empty or partial. Returns the number
    /// of items persisted.
    async fn replace_fortunes(&self, items: &[String]) -> Result<usize>;

    /// Overwrite the single shared snapshot record.
    async fn save_trend_snapshot(&self, snapshot: &TrendSnapshot) -> Result<()>;

    /// Apply one typed upsert operation.
    async fn apply_update(&self, op: &UpdateOp) -> Result<()>;
}
