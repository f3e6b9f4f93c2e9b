use thiserror::Error;

use crate::rag::RagError;
use crate::tools::ToolError;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to reach the language model API: {0}")]
    Transport(String),

    #[error("language model API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed response from the language model API: {0}")]
    MalformedResponse(String),

    #[error("malformed tool call: {0}")]
    MalformedToolCall(String),

    /// A tool failed because retrieval did; keeps the store error as its source.
    #[error("tool failed: {0}")]
    Tool(#[from] RagError),
}

impl GenerationError {
    /// Rate limiting, overload, server errors and transport failures.
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Transport(_) => true,
            GenerationError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<ToolError> for GenerationError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::InvalidArguments { .. } => {
                GenerationError::MalformedToolCall(err.to_string())
            }
            ToolError::Rag(inner) => GenerationError::Tool(inner),
        }
    }
}
