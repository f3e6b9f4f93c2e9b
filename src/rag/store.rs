//! Storage interface shared by the course vector backends.
//!
//! A backend holds two collections: the chunked course content and a
//! catalog with one entry per course. The catalog entry's embedding is the
//! course title, so fuzzy course names can be resolved semantically.
//! Implementations live in the `sqlite` and `chroma` modules.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::chunker::CourseChunk;
use super::document::Course;
use super::error::RagError;

/// Metadata restriction applied to a content search. `None` fields match
/// everything; set fields must all match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkFilter {
    pub course_title: Option<String>,
    pub lesson_number: Option<u32>,
}

/// Result of a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub lesson_link: Option<String>,
    /// Similarity score (higher = better).
    pub score: f32,
}

impl SearchResult {
    pub fn citation(&self) -> SourceCitation {
        SourceCitation::new(&self.course_title, self.lesson_number, self.lesson_link.clone())
    }
}

/// Human-readable provenance of a search result, shown next to answers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceCitation {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl SourceCitation {
    pub fn new(course_title: &str, lesson_number: Option<u32>, link: Option<String>) -> Self {
        let label = match lesson_number {
            Some(number) => format!("{} - Lesson {}", course_title, number),
            None => course_title.to_string(),
        };
        Self { label, link }
    }
}

#[async_trait]
pub trait RagStore: Send + Sync {
    /// Backend name, for logs and the health endpoint.
    fn name(&self) -> &str;

    /// Insert or replace chunks keyed by [`CourseChunk::key`].
    async fn upsert(&self, items: Vec<(CourseChunk, Vec<f32>)>) -> Result<(), RagError>;

    /// Top `limit` chunks by similarity, restricted by `filter`.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filter: &ChunkFilter,
    ) -> Result<Vec<SearchResult>, RagError>;

    /// Insert or replace the catalog entry for `course`.
    async fn upsert_course(&self, course: &Course, title_embedding: Vec<f32>)
        -> Result<(), RagError>;

    /// Catalog lookup by exact title.
    async fn get_course(&self, title: &str) -> Result<Option<Course>, RagError>;

    /// All catalog entries, ordered by title.
    async fn courses(&self) -> Result<Vec<Course>, RagError>;

    /// Catalog entry whose title embedding is closest to `embedding`, with
    /// its similarity.
    async fn nearest_course(&self, embedding: &[f32]) -> Result<Option<(String, f32)>, RagError>;

    async fn chunk_count(&self) -> Result<usize, RagError>;

    /// Remove every chunk and catalog entry.
    async fn clear(&self) -> Result<(), RagError>;
}

/// Cosine similarity; 0.0 for mismatched or zero-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
