//! Course-aware retrieval over a [`RagStore`] and an [`Embedder`].

use std::sync::Arc;

use serde::Serialize;

use super::chunker::CourseChunk;
use super::document::Course;
use super::embedding::Embedder;
use super::error::RagError;
use super::store::{ChunkFilter, RagStore, SearchResult};
use crate::core::config::VectorStoreConfig;

/// Filters as the model supplies them: the course name may be partial or
/// fuzzy and is resolved against the catalog before searching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub course_name: Option<String>,
    pub lesson_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
    pub lesson_counts: Vec<usize>,
}

pub struct CourseIndex {
    store: Arc<dyn RagStore>,
    embedder: Arc<dyn Embedder>,
    max_results: usize,
    course_match_threshold: f32,
}

impl CourseIndex {
    pub fn new(
        store: Arc<dyn RagStore>,
        embedder: Arc<dyn Embedder>,
        config: &VectorStoreConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            max_results: config.max_results,
            course_match_threshold: config.course_match_threshold,
        }
    }

    pub fn store(&self) -> &Arc<dyn RagStore> {
        &self.store
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.embedder
            .embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| RagError::Embedding("embedder returned no vector".to_string()))
    }

    /// Embeds and stores chunks. Returns how many were written.
    pub async fn upsert(&self, chunks: Vec<CourseChunk>) -> Result<usize, RagError> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let count = chunks.len();
        self.store
            .upsert(chunks.into_iter().zip(embeddings).collect())
            .await?;
        Ok(count)
    }

    /// Adds or replaces the catalog entry for a course.
    pub async fn add_course(&self, course: &Course) -> Result<(), RagError> {
        let embedding = self.embed_one(&course.title).await?;
        self.store.upsert_course(course, embedding).await
    }

    /// Semantic search over course content.
    ///
    /// An unresolvable course name yields no results rather than silently
    /// searching every course.
    pub async fn query(
        &self,
        text: &str,
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>, RagError> {
        let course_title = match filters.course_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => match self.resolve_course_name(name).await? {
                Some(title) => Some(title),
                None => {
                    tracing::debug!("No course matches '{}'", name);
                    return Ok(Vec::new());
                }
            },
            _ => None,
        };

        let filter = ChunkFilter {
            course_title,
            lesson_number: filters.lesson_number,
        };
        let embedding = self.embed_one(text).await?;
        self.store.search(&embedding, k, &filter).await
    }

    /// Maps a user-supplied course name to a catalog title: exact match
    /// (ignoring case), then a unique substring match, then the semantically
    /// closest title if it clears the match threshold.
    pub async fn resolve_course_name(&self, name: &str) -> Result<Option<String>, RagError> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        let titles = self.course_titles().await?;
        if let Some(title) = titles.iter().find(|t| t.to_lowercase() == needle) {
            return Ok(Some(title.clone()));
        }

        let partial: Vec<&String> = titles
            .iter()
            .filter(|t| t.to_lowercase().contains(&needle))
            .collect();
        if let [only] = partial.as_slice() {
            return Ok(Some((*only).clone()));
        }

        if titles.is_empty() {
            return Ok(None);
        }
        let embedding = self.embed_one(name).await?;
        Ok(self
            .store
            .nearest_course(&embedding)
            .await?
            .filter(|(_, score)| *score >= self.course_match_threshold)
            .map(|(title, _)| title))
    }

    /// Catalog entry for a possibly fuzzy course name.
    pub async fn course_outline(&self, name: &str) -> Result<Option<Course>, RagError> {
        match self.resolve_course_name(name).await? {
            Some(title) => self.store.get_course(&title).await,
            None => Ok(None),
        }
    }

    pub async fn courses(&self) -> Result<Vec<Course>, RagError> {
        self.store.courses().await
    }

    pub async fn course_titles(&self) -> Result<Vec<String>, RagError> {
        Ok(self
            .store
            .courses()
            .await?
            .into_iter()
            .map(|course| course.title)
            .collect())
    }

    pub async fn course_count(&self) -> Result<usize, RagError> {
        Ok(self.store.courses().await?.len())
    }

    pub async fn has_course(&self, title: &str) -> Result<bool, RagError> {
        Ok(self.store.get_course(title).await?.is_some())
    }

    pub async fn analytics(&self) -> Result<CourseAnalytics, RagError> {
        let courses = self.store.courses().await?;
        Ok(CourseAnalytics {
            total_courses: courses.len(),
            lesson_counts: courses.iter().map(|c| c.lessons.len()).collect(),
            course_titles: courses.into_iter().map(|c| c.title).collect(),
        })
    }

    pub async fn clear(&self) -> Result<(), RagError> {
        self.store.clear().await
    }
}
