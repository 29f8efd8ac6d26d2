// Service error taxonomy. Handlers are the error boundary: everything below
// them is converted into a JSON envelope, never propagated to the transport.

use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Caller omitted a required field; rejected before any external call.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Caller sent an operation tag outside the closed set.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// Caller sent a field that is present but undecodable.
    #[error("malformed field {0}: {1}")]
    MalformedField(&'static str, String),

    /// An upstream service (database, model provider, scrape target,
    /// messaging gateway) failed or was unreachable.
    #[error("{service} failure: {cause}")]
    Upstream {
        service: &'static str,
        cause: anyhow::Error,
    },

    /// The model was required to return JSON and did not. Kept distinct from
    /// transport errors so callers can retry with a stricter prompt.
    #[error("invalid model response structure: {0}")]
    InvalidModelResponse(String),

    /// A scrape run obtained no content at all.
    #[error("scrape produced no content")]
    EmptyScrape,

    /// A scheduled run was skipped because the previous one is still active.
    #[error("run already in progress")]
    RunInProgress,
}

impl AppError {
    pub fn upstream(service: &'static str, cause: impl Into<anyhow::Error>) -> Self {
        Self::Upstream {
            service,
            cause: cause.into(),
        }
    }
}

/// Standard failure envelope: HTTP 200 with a `result` discriminator.
pub fn fail_envelope(op: &str, err: &AppError) -> Value {
    json!({
        "result": "fail",
        "op": op,
        "message": err.to_string(),
    })
}

/// Partial-failure envelope for operations that half-committed (e.g. score
/// stored but leaderboard re-read failed).
pub fn partial_envelope(op: &str, message: &str) -> Value {
    json!({
        "result": "partial",
        "op": op,
        "message": message,
    })
}

/// Truncate a payload for log context without flooding the log.
pub fn log_excerpt(payload: &Value) -> String {
    let s = payload.to_string();
    if s.chars().count() > 200 {
        let mut excerpt: String = s.chars().take(200).collect();
        excerpt.push_str("...");
        excerpt
    } else {
        s
    }
}
