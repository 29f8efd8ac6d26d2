use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::config::Config;
use crate::model::{openai::OpenAiModel, LanguageModel};
use crate::notify::{GatewayNotifier, Notifier};
use crate::store::{mongo::MongoStore, DocumentStore};

pub type SharedState = Arc<AppState>;

/// Central application state: configuration plus every external client,
/// constructed once at startup and passed to every handler. Clients sit
/// behind trait objects so tests can substitute doubles.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub model: Arc<dyn LanguageModel>,
    pub notifier: Arc<dyn Notifier>,
    pub http: reqwest::Client,
}

impl AppState {
    /// Connect every external client once; handlers share the result.
    /// Connection pooling is delegated entirely to the client libraries.
    pub async fn connect(config: Config) -> Result<SharedState> {
        let store = MongoStore::connect(&config.mongo_url, &config.mongo_db).await?;
        let model = OpenAiModel::new(&config.ai_api_base, &config.ai_api_key);
        let notifier = GatewayNotifier::new(
            &config.gateway_url,
            &config.gateway_token,
            &config.gateway_chat_id,
        );
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Arc::new(Self {
            config,
            store: Arc::new(store),
            model: Arc::new(model),
            notifier: Arc::new(notifier),
            http,
        }))
    }
}
