//! Orchestrates one question: history, generation with tools, bookkeeping.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::core::config::AppConfig;
use crate::history::SessionStore;
use crate::llm::{GenerationError, Generator, LlmProvider};
use crate::rag::{
    Chunker, ChunkerError, CourseAnalytics, CourseIndex, CourseLoader, Embedder, LoadReport,
    RagError, RagStore, SourceCitation,
};
use crate::tools::{CourseOutlineTool, CourseSearchTool, ToolRegistry};

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("course store failed: {0}")]
    Store(#[from] RagError),

    #[error("answer generation failed: {0}")]
    Generation(GenerationError),
}

impl From<GenerationError> for AssistantError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Tool(inner) => AssistantError::Store(inner),
            other => AssistantError::Generation(other),
        }
    }
}

impl AssistantError {
    /// Text safe to show to the person asking.
    pub fn user_message(&self) -> String {
        let message = match self {
            AssistantError::Store(RagError::Embedding(_))
            | AssistantError::Store(RagError::StoreUnavailable(_)) => {
                "The course search service is unavailable right now. Please try again shortly."
            }
            AssistantError::Store(_) => "Something went wrong while reading the course materials.",
            AssistantError::Generation(GenerationError::Transport(_)) => {
                "Could not reach the language model. Please check the network connection and \
                 try again."
            }
            AssistantError::Generation(GenerationError::Api { status: 401 | 403, .. }) => {
                "The language model rejected our credentials. Please check the API key \
                 configuration."
            }
            AssistantError::Generation(GenerationError::Api { status: 429, .. }) => {
                "The language model is rate limiting requests. Please wait a moment and try again."
            }
            AssistantError::Generation(_) => {
                "I couldn't generate an answer right now. Please try again."
            }
        };
        message.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceCitation>,
    pub session_id: String,
}

pub fn wrap_query(query: &str) -> String {
    format!("Answer this question about course materials: {}", query)
}

pub struct CourseAssistant {
    index: Arc<CourseIndex>,
    loader: CourseLoader,
    sessions: Arc<SessionStore>,
    generator: Generator,
    tools: ToolRegistry,
}

impl CourseAssistant {
    pub fn new(
        index: Arc<CourseIndex>,
        loader: CourseLoader,
        sessions: Arc<SessionStore>,
        generator: Generator,
    ) -> Self {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(CourseSearchTool::new(index.clone())));
        tools.register(Arc::new(CourseOutlineTool::new(index.clone())));

        Self {
            index,
            loader,
            sessions,
            generator,
            tools,
        }
    }

    /// Wires the assistant from configuration and the three external seams.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn RagStore>,
        embedder: Arc<dyn Embedder>,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Self, ChunkerError> {
        let chunker = Chunker::new(config.rag.chunk_size, config.rag.chunk_overlap)?;
        let index = Arc::new(CourseIndex::new(store, embedder, &config.vector_store));
        let loader = CourseLoader::new(index.clone(), chunker, config.documents.load_concurrency);
        let sessions = Arc::new(SessionStore::new(config.history_capacity()));
        let generator = Generator::new(provider, &config.llm);
        Ok(Self::new(index, loader, sessions, generator))
    }

    pub fn index(&self) -> &Arc<CourseIndex> {
        &self.index
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub async fn answer(
        &self,
        query: &str,
        session_id: Option<String>,
    ) -> Result<Answer, AssistantError> {
        let session_id = match session_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id,
            None => self.sessions.create_session().await,
        };

        let history = self.sessions.format_history(&session_id).await;
        let generated = self
            .generator
            .generate(&wrap_query(query), history.as_deref(), &self.tools)
            .await?;

        self.sessions
            .add_exchange(&session_id, query, generated.text.clone())
            .await;
        tracing::info!(
            session = %session_id,
            rounds = generated.rounds,
            sources = generated.sources.len(),
            "Answered query"
        );

        Ok(Answer {
            answer: generated.text,
            sources: generated.sources,
            session_id,
        })
    }

    pub async fn course_analytics(&self) -> Result<CourseAnalytics, AssistantError> {
        Ok(self.index.analytics().await?)
    }

    pub async fn load_course_folder(
        &self,
        path: &Path,
        clear_existing: bool,
    ) -> Result<LoadReport, AssistantError> {
        Ok(self.loader.load_folder(path, clear_existing).await?)
    }

    pub async fn clear_session(&self, session_id: &str) -> bool {
        self.sessions.clear(session_id).await
    }
}
