pub mod paths;
pub mod service;
pub mod settings;
pub mod validation;

use std::path::PathBuf;

use thiserror::Error;

pub use paths::AppPaths;
pub use service::ConfigService;
pub use settings::{
    AppConfig, DocumentsConfig, EmbeddingConfig, LlmConfig, RagConfig, ServerConfig,
    VectorBackend, VectorStoreConfig,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config at '{path}': {reason}")]
    Invalid { path: String, reason: String },
}
