#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use course_rag_backend::assistant::CourseAssistant;
use course_rag_backend::core::config::AppConfig;
use course_rag_backend::llm::types::{ContentBlock, MessagesRequest, MessagesResponse};
use course_rag_backend::llm::{GenerationError, LlmProvider};
use course_rag_backend::rag::{Embedder, RagError, SqliteRagStore};
use course_rag_backend::state::AppState;

pub const RUST_COURSE: &str = "Course Title: Rust Fundamentals
Course Link: https://example.com/rust
Course Instructor: Ferris

Lesson 1: Ownership
Lesson Link: https://example.com/rust/1
Ownership rules: each value has one owner and is dropped when the owner goes out of scope.

Lesson 2: Borrowing
References borrow values without taking ownership.
";

pub const MCP_COURSE: &str = "Course Title: MCP: Build Rich-Context AI Apps
Course Link: https://example.com/mcp
Course Instructor: Elie

Lesson 1: Why MCP
MCP standardizes how models reach tools and data through a server.

Lesson 2: Building a server
An MCP server exposes tools to a client.
";

pub const VOCABULARY: [&str; 8] = [
    "rust", "ownership", "borrow", "mcp", "server", "tools", "owner", "fundamentals",
];

/// Bag-of-words embedder over a fixed vocabulary.
pub struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model(&self) -> &str {
        "keywords"
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(inputs
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                VOCABULARY
                    .iter()
                    .map(|word| lower.matches(word).count() as f32)
                    .collect()
            })
            .collect())
    }
}

/// Embedder whose service is down.
pub struct OfflineEmbedder;

#[async_trait]
impl Embedder for OfflineEmbedder {
    fn model(&self) -> &str {
        "offline"
    }

    async fn embed(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Err(RagError::Embedding("connection refused".into()))
    }
}

/// Replays canned responses and records every request.
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<MessagesResponse, GenerationError>>>,
    requests: Mutex<Vec<MessagesRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<MessagesResponse, GenerationError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<MessagesRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: &MessagesRequest,
    ) -> Result<MessagesResponse, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(text("out of script")))
    }
}

pub fn text(text: &str) -> MessagesResponse {
    MessagesResponse {
        content: vec![ContentBlock::Text {
            text: text.to_string(),
        }],
        stop_reason: None,
        usage: None,
    }
}

pub fn search(id: &str, args: Value) -> MessagesResponse {
    MessagesResponse {
        content: vec![ContentBlock::ToolUse {
            id: id.to_string(),
            name: "search_course_content".to_string(),
            input: args,
        }],
        stop_reason: None,
        usage: None,
    }
}

pub fn search_query(id: &str, query: &str) -> MessagesResponse {
    search(id, json!({ "query": query }))
}

pub fn write_docs(dir: &Path) -> std::path::PathBuf {
    let docs = dir.join("docs");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(docs.join("rust.txt"), RUST_COURSE).unwrap();
    std::fs::write(docs.join("mcp.txt"), MCP_COURSE).unwrap();
    docs
}

pub async fn assistant_with(
    dir: &Path,
    config: &AppConfig,
    embedder: Arc<dyn Embedder>,
    provider: Arc<ScriptedProvider>,
) -> CourseAssistant {
    let store = SqliteRagStore::with_path(dir.join("rag.db")).await.unwrap();
    CourseAssistant::from_config(config, Arc::new(store), embedder, provider).unwrap()
}

/// Assistant over both sample courses, already loaded.
pub async fn loaded_assistant(dir: &Path, provider: Arc<ScriptedProvider>) -> CourseAssistant {
    let assistant =
        assistant_with(dir, &AppConfig::default(), Arc::new(KeywordEmbedder), provider).await;
    let report = assistant
        .load_course_folder(&write_docs(dir), false)
        .await
        .unwrap();
    assert_eq!(report.courses_added, 2);
    assistant
}

pub fn app_state(config: AppConfig, assistant: CourseAssistant) -> Arc<AppState> {
    AppState::from_parts(config, Arc::new(assistant))
}
