// OpenAI-compatible provider client. Thin call-sites over reqwest; no retry
// or rate-limit policy of its own.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::multipart;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::LanguageModel;

const CHAT_MODEL: &str = "gpt-4o-mini";
const TRANSCRIBE_MODEL: &str = "whisper-1";
const REQUEST_TIMEOUT_SECS: u64 = 120;

pub struct OpenAiModel {
    client: reqwest::Client,
    base: String,
    api_key: String,
}

impl OpenAiModel {
    pub fn new(base: &str, api_key: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn post_json(&self, path: &str, payload: &Value) -> Result<reqwest::Response> {
        let resp = self
            .client
            .post(format!("{}{}", self.base, path))
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(anyhow!("provider returned HTTP {}: {}", status.as_u16(), excerpt));
        }
        Ok(resp)
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let payload = json!({
            "model": CHAT_MODEL,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let parsed: Value = self.post_json("/chat/completions", &payload).await?.json().await?;
        let text = parsed["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("completion reply had no message content"))?;

        Ok(text.trim().to_string())
    }

    async fn complete_stream(&self, prompt: &str) -> Result<mpsc::Receiver<Result<Bytes>>> {
        let payload = json!({
            "model": CHAT_MODEL,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": true,
        });

        let resp = self.post_json("/chat/completions", &payload).await?;

        let (tx, rx) = mpsc::channel::<Result<Bytes>>(32);

        tokio::spawn(async move {
            let mut stream = resp.bytes_stream();
            let mut buf = String::new();

            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx.send(Err(e.into())).await;
                        return;
                    }
                };
                buf.push_str(&String::from_utf8_lossy(&chunk));

                // Drain complete SSE lines; a partial line stays buffered.
                while let Some(nl) = buf.find('\n') {
                    let line = buf[..nl].trim().to_string();
                    buf.drain(..=nl);

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data == "[DONE]" {
                        debug!("provider stream complete");
                        return;
                    }

                    let Ok(event) = serde_json::from_str::<Value>(data) else {
                        warn!("unparseable stream event: {}", data);
                        continue;
                    };
                    if let Some(delta) = event["choices"][0]["delta"]["content"].as_str() {
                        if !delta.is_empty()
                            && tx.send(Ok(Bytes::from(delta.to_owned()))).await.is_err()
                        {
                            // Receiver dropped (client disconnected).
                            debug!("stream receiver dropped");
                            return;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn transcribe(&self, audio: Bytes) -> Result<String> {
        let part = multipart::Part::bytes(audio.to_vec())
            .file_name("clip.webm")
            .mime_str("audio/webm")?;
        let form = multipart::Form::new()
            .text("model", TRANSCRIBE_MODEL)
            .part("file", part);

        let resp = self
            .client
            .post(format!("{}/audio/transcriptions", self.base))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(anyhow!("transcription returned HTTP {}: {}", status.as_u16(), excerpt));
        }

        let parsed: Value = resp.json().await?;
        let text = parsed["text"]
            .as_str()
            .ok_or_else(|| anyhow!("transcription reply had no text field"))?;

        Ok(text.trim().to_string())
    }
}
