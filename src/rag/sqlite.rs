//! SQLite-backed course store.
//!
//! In-process vector store using SQLite for metadata and brute-force cosine
//! similarity for search. Metadata filters are applied in SQL before scoring.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::chunker::CourseChunk;
use super::document::{Course, Lesson};
use super::error::RagError;
use super::store::{cosine_similarity, ChunkFilter, RagStore, SearchResult};

pub struct SqliteRagStore {
    pool: SqlitePool,
}

impl SqliteRagStore {
    pub async fn with_path(db_path: PathBuf) -> Result<Self, RagError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(RagError::store)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), RagError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS course_chunks (
                chunk_id TEXT PRIMARY KEY,
                course_title TEXT NOT NULL,
                lesson_number INTEGER,
                lesson_link TEXT,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::store)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chunks_course
             ON course_chunks(course_title, lesson_number)",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::store)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS course_catalog (
                title TEXT PRIMARY KEY,
                link TEXT,
                instructor TEXT,
                lessons TEXT NOT NULL DEFAULT '[]',
                embedding BLOB,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::store)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_course(row: &sqlx::sqlite::SqliteRow) -> Course {
        let lessons_json: String = row.get("lessons");
        let lessons = serde_json::from_str::<Vec<Lesson>>(&lessons_json).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable lesson list in catalog: {}", e);
            Vec::new()
        });

        Course {
            title: row.get("title"),
            link: row.get("link"),
            instructor: row.get("instructor"),
            lessons,
        }
    }
}

#[async_trait]
impl RagStore for SqliteRagStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn upsert(&self, items: Vec<(CourseChunk, Vec<f32>)>) -> Result<(), RagError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(RagError::store)?;

        for (chunk, embedding) in &items {
            sqlx::query(
                "INSERT OR REPLACE INTO course_chunks
                    (chunk_id, course_title, lesson_number, lesson_link,
                     chunk_index, content, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(chunk.key())
            .bind(&chunk.course_title)
            .bind(chunk.lesson_number.map(i64::from))
            .bind(&chunk.lesson_link)
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.content)
            .bind(Self::serialize_embedding(embedding))
            .execute(&mut *tx)
            .await
            .map_err(RagError::store)?;
        }

        tx.commit().await.map_err(RagError::store)?;
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filter: &ChunkFilter,
    ) -> Result<Vec<SearchResult>, RagError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT course_title, lesson_number, lesson_link, content, embedding
             FROM course_chunks
             WHERE (?1 IS NULL OR course_title = ?1)
               AND (?2 IS NULL OR lesson_number = ?2)",
        )
        .bind(filter.course_title.as_deref())
        .bind(filter.lesson_number.map(i64::from))
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::store)?;

        let mut scored: Vec<SearchResult> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored = Self::deserialize_embedding(&embedding_bytes);
                let lesson_number: Option<i64> = row.get("lesson_number");

                Some(SearchResult {
                    content: row.get("content"),
                    course_title: row.get("course_title"),
                    lesson_number: lesson_number.and_then(|n| u32::try_from(n).ok()),
                    lesson_link: row.get("lesson_link"),
                    score: cosine_similarity(query_embedding, &stored),
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);

        Ok(scored)
    }

    async fn upsert_course(
        &self,
        course: &Course,
        title_embedding: Vec<f32>,
    ) -> Result<(), RagError> {
        let lessons = serde_json::to_string(&course.lessons).map_err(RagError::store)?;

        sqlx::query(
            "INSERT OR REPLACE INTO course_catalog
                (title, link, instructor, lessons, embedding, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        )
        .bind(&course.title)
        .bind(&course.link)
        .bind(&course.instructor)
        .bind(lessons)
        .bind(Self::serialize_embedding(&title_embedding))
        .execute(&self.pool)
        .await
        .map_err(RagError::store)?;

        Ok(())
    }

    async fn get_course(&self, title: &str) -> Result<Option<Course>, RagError> {
        let row = sqlx::query(
            "SELECT title, link, instructor, lessons FROM course_catalog WHERE title = ?1",
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await
        .map_err(RagError::store)?;

        Ok(row.as_ref().map(Self::row_to_course))
    }

    async fn courses(&self) -> Result<Vec<Course>, RagError> {
        let rows = sqlx::query(
            "SELECT title, link, instructor, lessons FROM course_catalog ORDER BY title",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::store)?;

        Ok(rows.iter().map(Self::row_to_course).collect())
    }

    async fn nearest_course(&self, embedding: &[f32]) -> Result<Option<(String, f32)>, RagError> {
        let rows = sqlx::query("SELECT title, embedding FROM course_catalog")
            .fetch_all(&self.pool)
            .await
            .map_err(RagError::store)?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let bytes: Vec<u8> = row.get("embedding");
                if bytes.is_empty() {
                    return None;
                }
                let score = cosine_similarity(embedding, &Self::deserialize_embedding(&bytes));
                Some((row.get::<String, _>("title"), score))
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal)))
    }

    async fn chunk_count(&self) -> Result<usize, RagError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(RagError::store)?;
        Ok(count as usize)
    }

    async fn clear(&self) -> Result<(), RagError> {
        let mut tx = self.pool.begin().await.map_err(RagError::store)?;
        sqlx::query("DELETE FROM course_chunks")
            .execute(&mut *tx)
            .await
            .map_err(RagError::store)?;
        sqlx::query("DELETE FROM course_catalog")
            .execute(&mut *tx)
            .await
            .map_err(RagError::store)?;
        tx.commit().await.map_err(RagError::store)?;
        Ok(())
    }
}
