//! Typed application configuration.
//!
//! Every field has a default so a missing `config.yml` still yields a
//! runnable (if LLM-less) setup. Values are layered by `ConfigService`:
//! `config.yml` < `secrets.yaml` < environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    pub rag: RagConfig,
    pub documents: DocumentsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    /// Requests per minute accepted by `/api/query`; 0 disables the limiter.
    pub query_rate_limit_per_minute: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
            query_rate_limit_per_minute: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub api_version: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Upper bound on tool-use rounds before a final answer is forced.
    pub max_tool_rounds: usize,
    pub timeout_secs: u64,
    /// Retries for transient API failures (429 / 5xx / connect). 0 = never.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            api_version: "2023-06-01".to_string(),
            max_tokens: 800,
            temperature: 0.0,
            max_tool_rounds: 2,
            timeout_secs: 60,
            max_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible embeddings server.
    pub base_url: String,
    pub model: String,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            model: "all-MiniLM-L6-v2".to_string(),
            batch_size: 32,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    #[default]
    Sqlite,
    Chroma,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub backend: VectorBackend,
    pub chroma_url: String,
    /// Overrides the default `<data dir>/course_rag.db`.
    pub sqlite_path: Option<PathBuf>,
    pub max_results: usize,
    /// Minimum title similarity for semantic course-name resolution.
    pub course_match_threshold: f32,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Sqlite,
            chroma_url: "http://127.0.0.1:8001".to_string(),
            sqlite_path: None,
            max_results: 5,
            course_match_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Number of question/answer pairs remembered per session.
    pub max_history: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
            max_history: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DocumentsConfig {
    pub path: PathBuf,
    pub clear_existing: bool,
    pub load_concurrency: usize,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("../docs"),
            clear_existing: false,
            load_concurrency: 4,
        }
    }
}

impl AppConfig {
    /// Session store capacity in individual messages.
    pub fn history_capacity(&self) -> usize {
        self.rag.max_history * 2
    }
}
