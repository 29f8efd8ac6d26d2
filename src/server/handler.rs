// Axum request handlers — one handler per orchestration capability.
// Handlers are the error boundary: business failures travel as HTTP 200
// with a `result` discriminator; status codes are reserved for transport
// faults.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{debug, error, warn};

use crate::config::{SEARCH_FALLBACK_MARKER, SEARCH_PRIMARY_MARKER};
use crate::error::{fail_envelope, log_excerpt, partial_envelope, AppError};
use crate::model::{build_answer_prompt, cleanup::scrub_model_reply};
use crate::notify::notify_all;
use crate::scrape::extract::texts_by_class;
use crate::state::{AppState, SharedState};
use crate::store::{ops::KNOWN_TAGS, ops::UpdateOp, ScoreRecord};

pub struct ApiServer {
    port: u16,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl ApiServer {
    /// Bind and start serving in the background, returning a handle.
    /// Pass port 0 to pick a free port.
    pub async fn start(state: SharedState, port: u16) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        let port = listener.local_addr()?.port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let app = router(state);
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Ok(Self {
            port,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Shut the server down gracefully.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/saveScore", post(save_score))
        .route("/search", post(search))
        .route("/generate", post(generate))
        .route("/processAudio", post(process_audio))
        .route("/scrape", post(scrape_search))
        .route("/sports", post(sports_data))
        .route("/update", post(update_record))
        .with_state(state)
}

fn ok_json(body: Value) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

fn field_str<'a>(payload: &'a Value, key: &'static str) -> Result<&'a str, AppError> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or(AppError::MissingField(key))
}

fn field_i64(payload: &Value, key: &'static str) -> Result<i64, AppError> {
    payload
        .get(key)
        .and_then(Value::as_i64)
        .ok_or(AppError::MissingField(key))
}

/// POST /saveScore — insert, then re-read the leaderboard for that game.
async fn save_score(State(state): State<SharedState>, Json(payload): Json<Value>) -> Response {
    let op = "saveScore";

    let parsed = field_str(&payload, "game").and_then(|game| {
        let name = field_str(&payload, "name")?;
        let score = field_i64(&payload, "score")?;
        Ok((game.to_string(), name.to_string(), score))
    });
    let (game, name, score) = match parsed {
        Ok(fields) => fields,
        Err(e) => {
            warn!("{} rejected: {} payload={}", op, e, log_excerpt(&payload));
            return ok_json(fail_envelope(op, &e));
        }
    };

    let record = ScoreRecord {
        game: game.clone(),
        name,
        score,
        created_at: Utc::now(),
    };

    if let Err(e) = state.store.insert_score(&record).await {
        let err = AppError::upstream("database", e);
        error!("{} insert failed: {}", op, err);
        return ok_json(fail_envelope(op, &err));
    }

    match state.store.top_scores(&game).await {
        Ok(list) => ok_json(json!({ "op": op, "result": list })),
        Err(e) => {
            // The insert committed; hide nothing from the caller.
            error!("{} leaderboard re-read failed: {}", op, e);
            ok_json(partial_envelope(
                op,
                &format!("score stored but leaderboard read failed: {e}"),
            ))
        }
    }
}

/// POST /search — template + prompt + context through the model, scrubbed.
async fn search(State(state): State<SharedState>, Json(payload): Json<Value>) -> Response {
    let op = "search";

    let prompt = match field_str(&payload, "prompt") {
        Ok(p) => p,
        Err(e) => {
            warn!("{} rejected: {} payload={}", op, e, log_excerpt(&payload));
            return ok_json(fail_envelope(op, &e));
        }
    };
    let data = payload.get("data").and_then(Value::as_str).unwrap_or("");

    let full_prompt = build_answer_prompt(prompt, data);
    match state.model.complete(&full_prompt).await {
        Ok(reply) => {
            let message = scrub_model_reply(&reply);
            ok_json(json!({ "result": "success", "op": op, "message": message }))
        }
        Err(e) => {
            let err = AppError::upstream("model", e);
            error!("{} failed: {}", op, err);
            ok_json(fail_envelope(op, &err))
        }
    }
}

/// POST /generate — chunked plain-text stream of model output fragments,
/// forwarded in upstream order. The body ends when the provider stream does.
async fn generate(State(state): State<SharedState>, Json(payload): Json<Value>) -> Response {
    let op = "generate";

    let prompt = match field_str(&payload, "prompt") {
        Ok(p) => p,
        Err(e) => {
            warn!("{} rejected: {}", op, e);
            return ok_json(fail_envelope(op, &e));
        }
    };

    match state.model.complete_stream(prompt).await {
        Ok(rx) => {
            let stream = futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            });
            (
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                Body::from_stream(stream),
            )
                .into_response()
        }
        Err(e) => {
            let err = AppError::upstream("model", e);
            error!("{} failed: {}", op, err);
            ok_json(fail_envelope(op, &err))
        }
    }
}

/// POST /processAudio — transcribe, then answer the transcript. Replies
/// share the search envelope shape, including its `op` tag.
async fn process_audio(State(state): State<SharedState>, Json(payload): Json<Value>) -> Response {
    let op = "search";

    let clip = match field_str(&payload, "audio").and_then(decode_audio) {
        Ok(clip) => clip,
        Err(e) => {
            warn!(
                "processAudio rejected: {} payload={}",
                e,
                log_excerpt(&payload)
            );
            return ok_json(fail_envelope(op, &e));
        }
    };

    archive_clip(&state, clip.clone()).await;

    let transcript = match state.model.transcribe(clip).await {
        Ok(text) => text,
        Err(e) => {
            let err = AppError::upstream("model", e);
            error!("processAudio transcription failed: {}", err);
            return ok_json(fail_envelope(op, &err));
        }
    };
    debug!("transcript: {}", transcript);

    let full_prompt = build_answer_prompt(&transcript, "");
    match state.model.complete(&full_prompt).await {
        Ok(reply) => {
            let message = scrub_model_reply(&reply);
            ok_json(json!({ "result": "success", "op": op, "message": message }))
        }
        Err(e) => {
            let err = AppError::upstream("model", e);
            error!("processAudio completion failed: {}", err);
            ok_json(fail_envelope(op, &err))
        }
    }
}

fn decode_audio(encoded: &str) -> Result<Bytes, AppError> {
    // Tolerate a data-URL prefix from browser recorders.
    let raw = match encoded.find("base64,") {
        Some(idx) => &encoded[idx + 7..],
        None => encoded,
    };
    BASE64
        .decode(raw.trim())
        .map(Bytes::from)
        .map_err(|e| AppError::MalformedField("audio", e.to_string()))
}

/// Best-effort archive of the raw clip; failure is logged, never surfaced.
async fn archive_clip(state: &AppState, clip: Bytes) {
    let key = format!("clips/{}.webm", Utc::now().timestamp_millis());
    let url = format!(
        "{}/{}/{}",
        state.config.storage_base.trim_end_matches('/'),
        state.config.storage_bucket,
        key
    );

    match state.http.put(&url).body(clip).send().await {
        Ok(resp) if resp.status().is_success() => debug!("audio clip archived as {}", key),
        Ok(resp) => warn!("clip archive rejected: HTTP {}", resp.status().as_u16()),
        Err(e) => warn!("clip archive failed: {}", e),
    }
}

/// POST /scrape — fetch the search page, extract result titles, notify the
/// gateway once per match. The fan-out is awaited as a group and per-item
/// failures are reported in the envelope. An unreachable page is the one
/// unrecoverable case and returns 500.
async fn scrape_search(State(state): State<SharedState>, Json(payload): Json<Value>) -> Response {
    let op = "scrape";

    let query = match field_str(&payload, "query") {
        Ok(q) => q,
        Err(e) => {
            warn!("{} rejected: {}", op, e);
            return ok_json(fail_envelope(op, &e));
        }
    };

    let url = format!("{}{}", state.config.search_url, query.replace(' ', "+"));
    let html = match fetch_page(&state, &url).await {
        Ok(html) => html,
        Err(e) => {
            let err = AppError::upstream("scrape target", e);
            error!("{} fetch failed: {}", op, err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(fail_envelope(op, &err)),
            )
                .into_response();
        }
    };

    let mut titles = texts_by_class(&html, SEARCH_PRIMARY_MARKER);
    if titles.is_empty() {
        debug!("{} primary marker matched nothing, trying fallback", op);
        titles = texts_by_class(&html, SEARCH_FALLBACK_MARKER);
    }

    let failures = notify_all(state.notifier.as_ref(), &titles).await;
    for (index, message) in &failures {
        warn!("{} notification {} failed: {}", op, index, message);
    }

    ok_json(json!({
        "result": "success",
        "op": op,
        "matched": titles.len(),
        "delivered": titles.len() - failures.len(),
        "failures": failures
            .iter()
            .map(|(index, message)| json!({ "index": index, "error": message }))
            .collect::<Vec<_>>(),
    }))
}

async fn fetch_page(state: &AppState, url: &str) -> anyhow::Result<String> {
    let resp = state.http.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        anyhow::bail!("page fetch returned HTTP {}", status.as_u16());
    }
    Ok(resp.text().await?)
}

/// POST /sports — pass-through fetch from the sports REST provider.
async fn sports_data(State(state): State<SharedState>, Json(payload): Json<Value>) -> Response {
    let op = "sports";

    let league = payload
        .get("league")
        .and_then(Value::as_str)
        .unwrap_or("4328");
    let url = format!(
        "{}/eventsnextleague.php?id={}",
        state.config.sports_api_base, league
    );

    let resp = match state.http.get(&url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            let err = AppError::upstream("sports provider", e);
            error!("{} fetch failed: {}", op, err);
            return ok_json(fail_envelope(op, &err));
        }
    };

    match resp.json::<Value>().await {
        Ok(data) => ok_json(json!({ "result": "success", "op": op, "data": data })),
        Err(e) => {
            let err = AppError::upstream("sports provider", e);
            error!("{} decode failed: {}", op, err);
            ok_json(fail_envelope(op, &err))
        }
    }
}

/// POST /update — typed upsert gateway. Unknown tags never reach the store.
async fn update_record(State(state): State<SharedState>, Json(payload): Json<Value>) -> Response {
    let op = "update";

    let parsed: Result<UpdateOp, _> = serde_json::from_value(payload.clone());
    let update = match parsed {
        Ok(update) => update,
        Err(e) => {
            let err = match payload.get("op").and_then(Value::as_str) {
                None => AppError::MissingField("op"),
                Some(tag) if !KNOWN_TAGS.contains(&tag) => {
                    AppError::UnknownOperation(tag.to_string())
                }
                Some(_) => AppError::MalformedField("op", e.to_string()),
            };
            warn!("{} rejected: {} payload={}", op, err, log_excerpt(&payload));
            return ok_json(fail_envelope(op, &err));
        }
    };

    match state.store.apply_update(&update).await {
        Ok(()) => ok_json(json!({ "result": "success", "op": op })),
        Err(e) => {
            let err = AppError::upstream("database", e);
            error!("{} failed: {}", op, err);
            ok_json(fail_envelope(op, &err))
        }
    }
}
