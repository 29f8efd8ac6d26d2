// Language-model layer: provider trait seam, prompt shaping, reply parsing.

pub mod cleanup;
pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::AppError;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// One-shot completion returning the reply text.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Streaming completion. Fragments are forwarded in the order the
    /// provider emits them; the channel closes when the upstream stream ends.
    async fn complete_stream(&self, prompt: &str) -> Result<mpsc::Receiver<Result<Bytes>>>;

    /// Speech-to-text for an uploaded audio clip.
    async fn transcribe(&self, audio: Bytes) -> Result<String>;
}

/// Fixed instruction template prepended to every answer-style completion.
pub fn build_answer_prompt(prompt: &str, data: &str) -> String {
    let mut full = format!("Answer in under 100 words, plain text only. {prompt}");
    if !data.trim().is_empty() {
        full.push_str("\n\nContext:\n");
        full.push_str(data);
    }
    full
}

/// Parse a reply that was required to be a JSON array of strings.
///
/// Models often wrap the array in prose or a code fence, so a bracketed
/// substring is accepted as a second attempt. Anything else is the distinct
/// invalid-response failure, not a generic error.
pub fn parse_string_array(reply: &str) -> Result<Vec<String>, AppError> {
    let trimmed = reply.trim();
    if let Ok(items) = serde_json::from_str::<Vec<String>>(trimmed) {
        return Ok(items);
    }

    if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']')) {
        if start < end {
            if let Ok(items) = serde_json::from_str::<Vec<String>>(&trimmed[start..=end]) {
                return Ok(items);
            }
        }
    }

    Err(AppError::InvalidModelResponse(
        "expected a JSON array of strings".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_array() {
        let items = parse_string_array(r#"["a", "b"]"#).unwrap();
        assert_eq!(items, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_fenced_array() {
        let reply = "Here you go:\n```json\n[\"one\", \"two\"]\n```";
        let items = parse_string_array(reply).unwrap();
        assert_eq!(items, vec!["one", "two"]);
    }

    #[test]
    fn test_parse_non_json_is_distinct_failure() {
        let err = parse_string_array("I cannot help with that.").unwrap_err();
        assert!(matches!(err, AppError::InvalidModelResponse(_)));
    }

    #[test]
    fn test_answer_prompt_includes_context_only_when_present() {
        let with = build_answer_prompt("summarize", "foo bar");
        assert!(with.contains("under 100 words"));
        assert!(with.contains("Context:\nfoo bar"));

        let without = build_answer_prompt("summarize", "  ");
        assert!(!without.contains("Context:"));
    }
}
