//! Bulk ingestion of course files from a folder.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;

use super::chunker::Chunker;
use super::document::{parse_course_file, ParsedCourse};
use super::error::RagError;
use super::index::CourseIndex;

const COURSE_EXTENSIONS: [&str; 1] = ["txt"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub courses_added: usize,
    pub chunks_added: usize,
    /// Titles already present in the catalog (or repeated within the batch).
    pub skipped: Vec<String>,
    /// Files that could not be parsed or stored, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

pub struct CourseLoader {
    index: Arc<CourseIndex>,
    chunker: Chunker,
    concurrency: usize,
}

impl CourseLoader {
    pub fn new(index: Arc<CourseIndex>, chunker: Chunker, concurrency: usize) -> Self {
        Self {
            index,
            chunker,
            concurrency: concurrency.max(1),
        }
    }

    /// Loads every course file in `dir`. Courses whose title is already in
    /// the catalog are skipped, so repeated loads are idempotent. A bad file
    /// is recorded in the report and does not stop the rest.
    pub async fn load_folder(
        &self,
        dir: &Path,
        clear_existing: bool,
    ) -> Result<LoadReport, RagError> {
        if clear_existing {
            tracing::info!("Clearing existing course data before load");
            self.index.clear().await?;
        }

        let paths = list_course_files(dir).await?;
        let mut known: HashSet<String> = self.index.course_titles().await?.into_iter().collect();
        let mut report = LoadReport::default();

        // Parsing runs concurrently; storing stays sequential so duplicate
        // titles inside one batch are detected deterministically.
        let parsed: Vec<(PathBuf, Result<ParsedCourse, RagError>)> = stream::iter(paths)
            .map(|path| async move {
                let result = parse_course_file(&path).await;
                (path, result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        for (path, result) in parsed {
            let parsed = match result {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    report.failed.push((path, e.to_string()));
                    continue;
                }
            };

            let title = parsed.course.title.clone();
            if known.contains(&title) {
                tracing::debug!("Course '{}' already loaded", title);
                report.skipped.push(title);
                continue;
            }

            match self.store_course(&parsed).await {
                Ok(chunks) => {
                    tracing::info!("Loaded course '{}' ({} chunks)", title, chunks);
                    report.courses_added += 1;
                    report.chunks_added += chunks;
                    known.insert(title);
                }
                Err(e) => {
                    tracing::warn!("Failed to store {}: {}", path.display(), e);
                    report.failed.push((path, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Chunks and stores one parsed course. Content is written before the
    /// catalog entry, so a course only counts as loaded once it is complete.
    pub async fn store_course(&self, parsed: &ParsedCourse) -> Result<usize, RagError> {
        let chunks = self.chunker.chunk_course(parsed);
        let written = self.index.upsert(chunks).await?;
        self.index.add_course(&parsed.course).await?;
        Ok(written)
    }
}

async fn list_course_files(dir: &Path) -> Result<Vec<PathBuf>, RagError> {
    let io_err = |source: std::io::Error| RagError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        let is_course = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                COURSE_EXTENSIONS
                    .iter()
                    .any(|allowed| ext.eq_ignore_ascii_case(allowed))
            });
        if is_course && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
