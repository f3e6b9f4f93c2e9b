//! Course retrieval.
//!
//! - `document`: parses course files into a [`Course`] plus text sections
//! - `chunker`: splits sections into overlapping [`CourseChunk`]s
//! - `embedding`: the [`Embedder`] seam and its HTTP client
//! - `store`: the [`RagStore`] seam, with SQLite and ChromaDB backends
//! - `index`: [`CourseIndex`], course-name resolution and filtered search
//! - `loader`: bulk ingestion of a documents folder

pub mod chroma;
pub mod chunker;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod loader;
pub mod sqlite;
pub mod store;

pub use chroma::ChromaRagStore;
pub use chunker::{Chunker, ChunkerError, Chunks, CourseChunk};
pub use document::{parse_course, parse_course_file, Course, Lesson, ParsedCourse, Section};
pub use embedding::{Embedder, HttpEmbedder};
pub use error::RagError;
pub use index::{CourseAnalytics, CourseIndex, SearchFilters};
pub use loader::{CourseLoader, LoadReport};
pub use sqlite::SqliteRagStore;
pub use store::{ChunkFilter, RagStore, SearchResult, SourceCitation};
