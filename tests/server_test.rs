// Integration tests for the HTTP surface, run against stubbed external
// clients and fake upstream servers on port 0.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{response::IntoResponse, routing::get, Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use arcade_backend::server::handler::ApiServer;

use common::{test_config, test_state, MemoryStore, StubModel, StubNotifier};

async fn start_server(state: arcade_backend::state::SharedState) -> ApiServer {
    ApiServer::start(state, 0).await.unwrap()
}

fn url(server: &ApiServer, path: &str) -> String {
    format!("http://127.0.0.1:{}{}", server.port(), path)
}

#[tokio::test]
async fn test_save_score_returns_sorted_leaderboard() {
    let store = Arc::new(MemoryStore::default());
    let state = test_state(
        test_config(),
        store.clone(),
        Arc::new(StubModel::replying("unused")),
        Arc::new(StubNotifier::default()),
    );
    let server = start_server(state).await;
    let client = reqwest::Client::new();

    for (name, score) in [("Alice", 42), ("Bob", 17), ("Carol", 99)] {
        let resp = client
            .post(url(&server, "/saveScore"))
            .json(&json!({ "game": "wallballshot", "name": name, "score": score }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let resp = client
        .post(url(&server, "/saveScore"))
        .json(&json!({ "game": "wallballshot", "name": "Dave", "score": 42 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["op"], "saveScore");

    let list = body["result"].as_array().unwrap();
    assert_eq!(list.len(), 4);

    // Sorted non-increasing by score; 99 is the current maximum.
    let scores: Vec<i64> = list.iter().map(|r| r["score"].as_i64().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    assert_eq!(scores[0], 99);

    // Server stamped a creation time on every record.
    assert!(list.iter().all(|r| r["created_at"].as_str().is_some()));

    server.shutdown();
}

#[tokio::test]
async fn test_save_score_partial_failure_is_surfaced() {
    let store = Arc::new(MemoryStore::default());
    store.fail_reads.store(true, Ordering::Relaxed);

    let state = test_state(
        test_config(),
        store.clone(),
        Arc::new(StubModel::replying("unused")),
        Arc::new(StubNotifier::default()),
    );
    let server = start_server(state).await;

    let resp = reqwest::Client::new()
        .post(url(&server, "/saveScore"))
        .json(&json!({ "game": "wallballshot", "name": "Alice", "score": 42 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"], "partial");
    assert!(body["message"].as_str().unwrap().contains("score stored"));

    // The insert itself committed.
    assert_eq!(store.scores.lock().len(), 1);

    server.shutdown();
}

#[tokio::test]
async fn test_save_score_missing_field_rejected_before_insert() {
    let store = Arc::new(MemoryStore::default());
    let state = test_state(
        test_config(),
        store.clone(),
        Arc::new(StubModel::replying("unused")),
        Arc::new(StubNotifier::default()),
    );
    let server = start_server(state).await;

    let resp = reqwest::Client::new()
        .post(url(&server, "/saveScore"))
        .json(&json!({ "game": "wallballshot", "score": 42 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"], "fail");
    assert_eq!(body["message"], "missing required field: name");
    assert!(store.scores.lock().is_empty());

    server.shutdown();
}

#[tokio::test]
async fn test_search_scrubs_model_reply() {
    let state = test_state(
        test_config(),
        Arc::new(MemoryStore::default()),
        Arc::new(StubModel::replying("**Hi** (note) more")),
        Arc::new(StubNotifier::default()),
    );
    let server = start_server(state).await;

    let resp = reqwest::Client::new()
        .post(url(&server, "/search"))
        .json(&json!({ "prompt": "summarize", "data": "foo bar" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"], "success");
    assert_eq!(body["op"], "search");
    assert_eq!(body["message"], "]Hi[ more");

    server.shutdown();
}

#[tokio::test]
async fn test_generate_streams_fragments_in_order() {
    let model = StubModel {
        reply: String::new(),
        stream_fragments: vec!["fir".into(), "st ".into(), "last".into()],
        transcript: String::new(),
    };
    let state = test_state(
        test_config(),
        Arc::new(MemoryStore::default()),
        Arc::new(model),
        Arc::new(StubNotifier::default()),
    );
    let server = start_server(state).await;

    let resp = reqwest::Client::new()
        .post(url(&server, "/generate"))
        .json(&json!({ "prompt": "write something" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));

    let body = resp.text().await.unwrap();
    assert_eq!(body, "first last");

    server.shutdown();
}

#[tokio::test]
async fn test_process_audio_transcribes_and_answers() {
    let model = StubModel {
        reply: "**Hi** (note) more".into(),
        stream_fragments: Vec::new(),
        transcript: "what is up".into(),
    };
    let state = test_state(
        test_config(),
        Arc::new(MemoryStore::default()),
        Arc::new(model),
        Arc::new(StubNotifier::default()),
    );
    let server = start_server(state).await;

    let audio = BASE64.encode(b"fake webm bytes");
    let resp = reqwest::Client::new()
        .post(url(&server, "/processAudio"))
        .json(&json!({ "audio": audio }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    // Audio replies share the search envelope shape.
    assert_eq!(body["op"], "search");
    assert_eq!(body["result"], "success");
    assert_eq!(body["message"], "]Hi[ more");

    server.shutdown();
}

#[tokio::test]
async fn test_update_applies_known_op_and_rejects_unknown() {
    let store = Arc::new(MemoryStore::default());
    let state = test_state(
        test_config(),
        store.clone(),
        Arc::new(StubModel::replying("unused")),
        Arc::new(StubNotifier::default()),
    );
    let server = start_server(state).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(url(&server, "/update"))
        .json(&json!({ "op": "adjustBalance", "site": "alpha", "userId": "u1", "delta": 10 }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"], "success");
    assert_eq!(store.updates.lock().as_slice(), ["balances"]);

    // Unknown tag: rejected before any store call, still HTTP 200.
    let resp = client
        .post(url(&server, "/update"))
        .json(&json!({ "op": "dropEverything", "site": "alpha" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"], "fail");
    assert_eq!(body["message"], "unknown operation: dropEverything");
    assert_eq!(store.updates.lock().len(), 1);

    // Missing tag entirely.
    let resp = client
        .post(url(&server, "/update"))
        .json(&json!({ "site": "alpha" }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "missing required field: op");

    server.shutdown();
}

async fn fake_search_page() -> impl IntoResponse {
    axum::response::Html(
        r#"<html><body>
            <a class="result__a" href="/a">rust async book</a>
            <a class="result__a" href="/b">tokio tutorial</a>
            <a class="result__a" href="/c">bad result</a>
        </body></html>"#,
    )
}

#[tokio::test]
async fn test_scrape_fans_out_and_collects_failures() {
    let upstream = Router::new().route("/html/", get(fake_search_page));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, upstream).await.ok();
    });

    let notifier = Arc::new(StubNotifier {
        fail_containing: Some("bad".into()),
        ..Default::default()
    });
    let mut config = test_config();
    config.search_url = format!("http://127.0.0.1:{}/html/?q=", upstream_port);

    let state = test_state(
        config,
        Arc::new(MemoryStore::default()),
        Arc::new(StubModel::replying("unused")),
        notifier.clone(),
    );
    let server = start_server(state).await;

    let resp = reqwest::Client::new()
        .post(url(&server, "/scrape"))
        .json(&json!({ "query": "rust async" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"], "success");
    assert_eq!(body["matched"], 3);
    assert_eq!(body["delivered"], 2);

    let failures = body["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["index"], 2);

    // Delivered notifications match the extracted titles.
    let sent = notifier.sent.lock();
    assert_eq!(sent.as_slice(), ["rust async book", "tokio tutorial"]);

    server.shutdown();
}

#[tokio::test]
async fn test_scrape_unreachable_target_is_500() {
    // test_config points the search page at an unroutable address.
    let state = test_state(
        test_config(),
        Arc::new(MemoryStore::default()),
        Arc::new(StubModel::replying("unused")),
        Arc::new(StubNotifier::default()),
    );
    let server = start_server(state).await;

    let resp = reqwest::Client::new()
        .post(url(&server, "/scrape"))
        .json(&json!({ "query": "anything" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"], "fail");

    server.shutdown();
}

#[tokio::test]
async fn test_sports_passthrough() {
    async fn fake_league() -> impl IntoResponse {
        Json(json!({ "events": [{ "strEvent": "Finals" }] }))
    }

    let upstream = Router::new().route("/eventsnextleague.php", get(fake_league));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, upstream).await.ok();
    });

    let mut config = test_config();
    config.sports_api_base = format!("http://127.0.0.1:{}", upstream_port);

    let state = test_state(
        config,
        Arc::new(MemoryStore::default()),
        Arc::new(StubModel::replying("unused")),
        Arc::new(StubNotifier::default()),
    );
    let server = start_server(state).await;

    let resp = reqwest::Client::new()
        .post(url(&server, "/sports"))
        .json(&json!({ "league": "4328" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"], "success");
    assert_eq!(body["data"]["events"][0]["strEvent"], "Finals");

    server.shutdown();
}
