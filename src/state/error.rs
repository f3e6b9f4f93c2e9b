use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to initialize vector store: {0}")]
    Store(#[source] anyhow::Error),

    #[error("Failed to initialize embedding client: {0}")]
    Embedder(#[source] anyhow::Error),

    #[error("Failed to initialize LLM client: {0}")]
    Llm(#[source] anyhow::Error),

    #[error("Failed to build course assistant: {0}")]
    Assistant(#[source] anyhow::Error),
}
