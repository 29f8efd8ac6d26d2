use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, to_document, Document};
use mongodb::{Client, Collection, Database};
use tracing::{debug, info};

use super::ops::UpdateOp;
use super::{DocumentStore, ScoreRecord, TrendSnapshot};

/// Fixed id of the single shared trend snapshot record.
const TREND_SNAPSHOT_ID: &str = "latest";

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connect once at process start; the driver owns pooling from here.
    pub async fn connect(url: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(url).await?;
        info!("connected to document store, db={}", db_name);
        Ok(Self {
            db: client.database(db_name),
        })
    }

    fn scores(&self) -> Collection<ScoreRecord> {
        self.db.collection("scores")
    }

    fn fortunes(&self) -> Collection<Document> {
        self.db.collection("fortunes")
    }

    fn trends(&self) -> Collection<Document> {
        self.db.collection("trends")
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn insert_score(&self, record: &ScoreRecord) -> Result<()> {
        self.scores().insert_one(record).await?;
        Ok(())
    }

    async fn top_scores(&self, game: &str) -> Result<Vec<ScoreRecord>> {
        let cursor = self
            .scores()
            .find(doc! { "game": game })
            .sort(doc! { "score": -1 })
            .await?;
        let list: Vec<ScoreRecord> = cursor.try_collect().await?;
        Ok(list)
    }

    async fn replace_fortunes(&self, items: &[String]) -> Result<usize> {
        let deleted = self.fortunes().delete_many(doc! {}).await?.deleted_count;
        debug!("cleared {} fortunes before rewrite", deleted);

        if items.is_empty() {
            return Ok(0);
        }

        let docs: Vec<Document> = items
            .iter()
            .enumerate()
            .map(|(order, text)| doc! { "order": order as i64, "text": text.as_str() })
            .collect();
        self.fortunes().insert_many(docs).await?;
        Ok(items.len())
    }

    async fn save_trend_snapshot(&self, snapshot: &TrendSnapshot) -> Result<()> {
        let mut body = to_document(snapshot)?;
        body.insert("_id", TREND_SNAPSHOT_ID);
        self.trends()
            .replace_one(doc! { "_id": TREND_SNAPSHOT_ID }, body)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn apply_update(&self, op: &UpdateOp) -> Result<()> {
        let result = self
            .db
            .collection::<Document>(op.collection())
            .update_one(op.filter(), op.update())
            .upsert(true)
            .await?;
        debug!(
            "upsert on {}: matched={} modified={} upserted={}",
            op.collection(),
            result.matched_count,
            result.modified_count,
            result.upserted_id.is_some()
        );
        Ok(())
    }
}
