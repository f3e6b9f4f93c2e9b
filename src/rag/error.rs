use std::path::PathBuf;

use thiserror::Error;

/// Failures from document parsing, embedding and vector storage.
///
/// An empty search is not represented here: it is `Ok(vec![])`.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("embedding service failed: {0}")]
    Embedding(String),

    #[error("malformed document {path}: {reason}")]
    MalformedDocument { path: String, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RagError {
    pub fn store<E: std::fmt::Display>(err: E) -> Self {
        RagError::StoreUnavailable(err.to_string())
    }

    pub fn embedding<E: std::fmt::Display>(err: E) -> Self {
        RagError::Embedding(err.to_string())
    }

    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        RagError::MalformedDocument {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for failures of an external service (vector DB or embedder).
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RagError::StoreUnavailable(_) | RagError::Embedding(_))
    }
}
