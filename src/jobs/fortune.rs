// Fortune-list regeneration: ask the model for a fresh batch, scrub list
// markers, wholesale-replace the stored list.

use std::sync::Arc;

use tracing::info;

use crate::config::{FORTUNE_COUNT, FORTUNE_DISALLOWED_PREFIX};
use crate::error::AppError;
use crate::model::{parse_string_array, LanguageModel};
use crate::store::DocumentStore;

pub struct FortuneJob {
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn DocumentStore>,
}

impl FortuneJob {
    pub fn new(model: Arc<dyn LanguageModel>, store: Arc<dyn DocumentStore>) -> Self {
        Self { model, store }
    }

    /// Regenerate the whole list. Returns the number of items persisted,
    /// which equals the stored count on success.
    pub async fn run_once(&self) -> Result<usize, AppError> {
        let prompt = format!(
            "Write {FORTUNE_COUNT} short, upbeat one-line fortunes. \
             Reply with only a JSON array of strings."
        );

        let reply = self
            .model
            .complete(&prompt)
            .await
            .map_err(|e| AppError::upstream("model", e))?;

        let items = parse_string_array(&reply)?;
        let cleaned = scrub_fortunes(&items);

        let persisted = self
            .store
            .replace_fortunes(&cleaned)
            .await
            .map_err(|e| AppError::upstream("database", e))?;

        info!("fortune list regenerated, {} items", persisted);
        Ok(persisted)
    }
}

/// Drop empties and strip the disallowed list-marker prefix.
pub fn scrub_fortunes(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            item.trim()
                .trim_start_matches(FORTUNE_DISALLOWED_PREFIX)
                .trim()
                .to_string()
        })
        .filter(|item| !item.is_empty())
        .collect()
}
