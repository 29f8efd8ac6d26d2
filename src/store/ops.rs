// Typed upsert operations. Each tag maps to a fixed {collection, filter,
// update} triple; tags outside the closed set never reach the database.

use mongodb::bson::{doc, Document};
use serde::Deserialize;

/// Operation tags accepted on the wire, used to tell an unknown tag apart
/// from a known tag with a malformed body.
pub const KNOWN_TAGS: [&str; 6] = [
    "adjustBalance",
    "registerSite",
    "trackIssue",
    "recordBet",
    "addFile",
    "removeFile",
];

/// Closed set of business update operations.
///
/// Uniqueness of the touched record is enforced only by the filter, so every
/// variant carries its full composite business key.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum UpdateOp {
    #[serde(rename_all = "camelCase")]
    AdjustBalance {
        site: String,
        user_id: String,
        delta: i64,
    },
    RegisterSite {
        site: String,
        endpoint: String,
    },
    TrackIssue {
        site: String,
        round: i64,
        note: String,
    },
    #[serde(rename_all = "camelCase")]
    RecordBet {
        site: String,
        round: i64,
        user_id: String,
        amount: i64,
    },
    AddFile {
        site: String,
        path: String,
    },
    RemoveFile {
        site: String,
        path: String,
    },
}

impl UpdateOp {
    pub fn collection(&self) -> &'static str {
        match self {
            UpdateOp::AdjustBalance { .. } => "balances",
            UpdateOp::RegisterSite { .. } => "sites",
            UpdateOp::TrackIssue { .. } => "issues",
            UpdateOp::RecordBet { .. } => "bets",
            UpdateOp::AddFile { .. } | UpdateOp::RemoveFile { .. } => "sites",
        }
    }

    /// Filter selecting exactly one business record.
    pub fn filter(&self) -> Document {
        match self {
            UpdateOp::AdjustBalance { site, user_id, .. } => {
                doc! { "site": site.as_str(), "userId": user_id.as_str() }
            }
            UpdateOp::RegisterSite { site, .. } => doc! { "site": site.as_str() },
            UpdateOp::TrackIssue { site, round, .. } => {
                doc! { "site": site.as_str(), "round": *round }
            }
            UpdateOp::RecordBet {
                site,
                round,
                user_id,
                ..
            } => doc! { "site": site.as_str(), "round": *round, "userId": user_id.as_str() },
            UpdateOp::AddFile { site, .. } | UpdateOp::RemoveFile { site, .. } => {
                doc! { "site": site.as_str() }
            }
        }
    }

    pub fn update(&self) -> Document {
        match self {
            UpdateOp::AdjustBalance { delta, .. } => doc! { "$inc": { "balance": *delta } },
            UpdateOp::RegisterSite { endpoint, .. } => {
                doc! { "$set": { "endpoint": endpoint.as_str() } }
            }
            UpdateOp::TrackIssue { note, .. } => doc! { "$set": { "note": note.as_str() } },
            UpdateOp::RecordBet { amount, .. } => doc! { "$set": { "amount": *amount } },
            UpdateOp::AddFile { path, .. } => doc! { "$addToSet": { "files": path.as_str() } },
            UpdateOp::RemoveFile { path, .. } => doc! { "$pull": { "files": path.as_str() } },
        }
    }
}
