//! Fixed-size, overlapping chunking of course text.
//!
//! Sizes are measured in characters, not bytes. Consecutive chunks share
//! exactly `overlap` characters, and the last chunk ends at the end of the
//! text, so it may be shorter than `size`.

use std::iter::FusedIterator;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::document::ParsedCourse;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkerError {
    #[error("chunk size must be greater than zero")]
    ZeroSize,
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

/// A retrievable unit of course text plus the metadata used for filtering
/// and citations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseChunk {
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub lesson_link: Option<String>,
    /// Position within the course, counted across all of its sections.
    pub chunk_index: usize,
    pub content: String,
}

impl CourseChunk {
    /// Stable id derived from the chunk's position, so re-ingesting the same
    /// course replaces rows instead of duplicating them.
    pub fn key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.course_title.as_bytes());
        hasher.update([0x1f]);
        if let Some(number) = self.lesson_number {
            hasher.update(number.to_le_bytes());
        }
        hasher.update([0x1f]);
        hasher.update((self.chunk_index as u64).to_le_bytes());
        hex::encode(hasher.finalize())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(size: usize, overlap: usize) -> Result<Self, ChunkerError> {
        if size == 0 {
            return Err(ChunkerError::ZeroSize);
        }
        if overlap >= size {
            return Err(ChunkerError::OverlapTooLarge { size, overlap });
        }
        Ok(Self { size, overlap })
    }

    /// Lazily splits `text`. Empty text yields nothing.
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            text,
            size: self.size,
            step: self.size - self.overlap,
            pos: 0,
            done: text.is_empty(),
        }
    }

    /// Number of chunks `chunks(text)` produces, without materializing them.
    pub fn chunk_count(&self, text: &str) -> usize {
        let len = text.chars().count();
        if len == 0 {
            0
        } else if len <= self.size {
            1
        } else {
            let step = self.size - self.overlap;
            1 + (len - self.size).div_ceil(step)
        }
    }

    /// Chunks every section of a parsed course and tags each piece with its
    /// course and lesson.
    pub fn chunk_course(&self, parsed: &ParsedCourse) -> Vec<CourseChunk> {
        let course = &parsed.course;
        let mut chunk_index = 0;
        let mut out = Vec::new();

        for section in &parsed.sections {
            let lesson_link = section
                .lesson_number
                .and_then(|number| course.lesson(number))
                .and_then(|lesson| lesson.link.clone());

            for piece in self.chunks(&section.text) {
                out.push(CourseChunk {
                    course_title: course.title.clone(),
                    lesson_number: section.lesson_number,
                    lesson_link: lesson_link.clone(),
                    chunk_index,
                    content: piece.to_string(),
                });
                chunk_index += 1;
            }
        }

        out
    }
}

/// Iterator over overlapping windows of a string; see [`Chunker::chunks`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    size: usize,
    step: usize,
    /// Byte offset where the next window starts.
    pos: usize,
    done: bool,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let rest = &self.text[self.pos..];
        let end = rest
            .char_indices()
            .nth(self.size)
            .map(|(offset, _)| offset)
            .unwrap_or(rest.len());

        if end == rest.len() {
            self.done = true;
        } else {
            // rest holds more than `size` chars, so a char at `step` exists.
            let advance = rest
                .char_indices()
                .nth(self.step)
                .map(|(offset, _)| offset)
                .unwrap_or(rest.len());
            self.pos += advance;
        }

        Some(&rest[..end])
    }
}

impl FusedIterator for Chunks<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::document::parse_course;

    fn lengths(chunker: &Chunker, text: &str) -> Vec<usize> {
        chunker.chunks(text).map(|c| c.chars().count()).collect()
    }

    /// Drops each chunk's leading overlap and concatenates the rest.
    fn reassemble(chunker: &Chunker, text: &str) -> String {
        let mut out = String::new();
        for (i, chunk) in chunker.chunks(text).enumerate() {
            let skip = if i == 0 { 0 } else { chunker.overlap };
            out.extend(chunk.chars().skip(skip));
        }
        out
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert_eq!(Chunker::new(0, 0), Err(ChunkerError::ZeroSize));
        assert_eq!(
            Chunker::new(100, 100),
            Err(ChunkerError::OverlapTooLarge {
                size: 100,
                overlap: 100
            })
        );
        assert!(Chunker::new(1, 0).is_ok());
    }

    #[test]
    fn splits_with_shared_overlap() {
        let chunker = Chunker::new(800, 100).unwrap();
        let text: String = (0..1700).map(|i| char::from(b'a' + (i % 26) as u8)).collect();

        assert_eq!(lengths(&chunker, &text), vec![800, 800, 300]);
        assert_eq!(chunker.chunk_count(&text), 3);

        let chunks: Vec<&str> = chunker.chunks(&text).collect();
        let tail: String = chunks[0].chars().skip(700).collect();
        let head: String = chunks[1].chars().take(100).collect();
        assert_eq!(tail, head);
    }

    #[test]
    fn empty_and_short_text() {
        let chunker = Chunker::new(10, 2).unwrap();
        assert_eq!(chunker.chunks("").count(), 0);
        assert_eq!(chunker.chunk_count(""), 0);
        assert_eq!(chunker.chunks("short").collect::<Vec<_>>(), vec!["short"]);
        assert_eq!(chunker.chunks("exactly10!").count(), 1);
    }

    #[test]
    fn reassembly_and_count_hold_for_many_shapes() {
        for (size, overlap) in [(1, 0), (3, 1), (10, 9), (64, 8), (800, 100)] {
            let chunker = Chunker::new(size, overlap).unwrap();
            for len in [0usize, 1, 2, 7, 63, 64, 65, 700, 1500, 1700, 2049] {
                let text: String = (0..len).map(|i| char::from(b'0' + (i % 10) as u8)).collect();
                let chunks: Vec<&str> = chunker.chunks(&text).collect();

                assert_eq!(chunks.len(), chunker.chunk_count(&text), "size={size} len={len}");
                assert_eq!(reassemble(&chunker, &text), text, "size={size} len={len}");
                for chunk in &chunks {
                    assert!(chunk.chars().count() <= size);
                }
                for pair in chunks.windows(2) {
                    let tail: String =
                        pair[0].chars().skip(pair[0].chars().count() - overlap).collect();
                    let head: String = pair[1].chars().take(overlap).collect();
                    assert_eq!(tail, head);
                }
            }
        }
    }

    #[test]
    fn counts_characters_not_bytes() {
        let chunker = Chunker::new(4, 1).unwrap();
        let text = "héllo wörld ✓";
        let chunks: Vec<&str> = chunker.chunks(text).collect();

        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
        assert_eq!(reassemble(&chunker, text), text);
    }

    #[test]
    fn iterator_is_restartable_via_clone() {
        let chunker = Chunker::new(5, 2).unwrap();
        let iter = chunker.chunks("abcdefghijkl");
        let first: Vec<_> = iter.clone().collect();
        let second: Vec<_> = iter.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn chunk_course_tags_lessons_and_links() {
        let parsed = parse_course(
            "c.txt",
            "Course Title: Rust 101\nLesson 1: Ownership\nLesson Link: https://l/1\n\
             abcdefghij\nLesson 2: Borrowing\nklmno",
        )
        .unwrap();
        let chunker = Chunker::new(6, 2).unwrap();
        let chunks = chunker.chunk_course(&parsed);

        assert!(chunks.iter().all(|c| c.course_title == "Rust 101"));
        let lesson1: Vec<_> = chunks.iter().filter(|c| c.lesson_number == Some(1)).collect();
        assert_eq!(lesson1.len(), 2);
        assert!(lesson1.iter().all(|c| c.lesson_link.as_deref() == Some("https://l/1")));

        let indices: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, (0..chunks.len()).collect::<Vec<_>>());
        assert_eq!(chunks.last().unwrap().lesson_number, Some(2));
    }

    #[test]
    fn keys_are_stable_and_distinct() {
        let base = CourseChunk {
            course_title: "A".into(),
            lesson_number: Some(1),
            lesson_link: None,
            chunk_index: 0,
            content: "x".into(),
        };
        let mut other = base.clone();
        other.chunk_index = 1;
        let mut edited = base.clone();
        edited.content = "changed".into();

        assert_eq!(base.key(), edited.key());
        assert_ne!(base.key(), other.key());
        assert_eq!(base.key().len(), 64);
    }
}
