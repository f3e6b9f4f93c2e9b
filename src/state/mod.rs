use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

use crate::assistant::CourseAssistant;
use crate::core::config::{AppConfig, AppPaths, VectorBackend};
use crate::llm::AnthropicProvider;
use crate::rag::{ChromaRagStore, HttpEmbedder, RagStore, SqliteRagStore};

pub mod error;

use error::InitializationError;

/// Shared application state handed to every route.
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub assistant: Arc<CourseAssistant>,
    /// `None` when `server.query_rate_limit_per_minute` is 0.
    pub query_limiter: Option<DefaultDirectRateLimiter>,
}

impl AppState {
    /// Builds the state from validated configuration:
    /// 1. Connects the configured vector store (SQLite or ChromaDB)
    /// 2. Creates the embedding and Messages API clients
    /// 3. Wires the course assistant and the query rate limiter
    pub async fn initialize(
        paths: &AppPaths,
        config: AppConfig,
    ) -> Result<Arc<Self>, InitializationError> {
        let store: Arc<dyn RagStore> = match config.vector_store.backend {
            VectorBackend::Sqlite => {
                let db_path = config
                    .vector_store
                    .sqlite_path
                    .clone()
                    .unwrap_or_else(|| paths.rag_db_path.clone());
                Arc::new(
                    SqliteRagStore::with_path(db_path)
                        .await
                        .map_err(|e| InitializationError::Store(e.into()))?,
                )
            }
            VectorBackend::Chroma => Arc::new(
                ChromaRagStore::connect(&config.vector_store.chroma_url)
                    .await
                    .map_err(|e| InitializationError::Store(e.into()))?,
            ),
        };
        tracing::info!("Using {} vector store", store.name());

        let embedder = Arc::new(
            HttpEmbedder::new(&config.embedding)
                .map_err(|e| InitializationError::Embedder(e.into()))?,
        );

        if config.llm.api_key.trim().is_empty() {
            tracing::warn!("No Anthropic API key configured; queries will fail until one is set");
        }
        let provider = Arc::new(
            AnthropicProvider::new(&config.llm).map_err(|e| InitializationError::Llm(e.into()))?,
        );

        let assistant = CourseAssistant::from_config(&config, store, embedder, provider)
            .map_err(|e| InitializationError::Assistant(e.into()))?;

        Ok(Self::from_parts(config, Arc::new(assistant)))
    }

    pub fn from_parts(config: AppConfig, assistant: Arc<CourseAssistant>) -> Arc<Self> {
        let query_limiter = NonZeroU32::new(config.server.query_rate_limit_per_minute)
            .map(|per_minute| RateLimiter::direct(Quota::per_minute(per_minute)));

        Arc::new(AppState {
            config: Arc::new(config),
            assistant,
            query_limiter,
        })
    }

    /// Whether a query may run now.
    pub fn allow_query(&self) -> bool {
        self.query_limiter
            .as_ref()
            .map_or(true, |limiter| limiter.check().is_ok())
    }
}
