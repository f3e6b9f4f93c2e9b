//! Course document parsing.
//!
//! A course file starts with a small header (`Course Title:`, `Course Link:`,
//! `Course Instructor:`) followed by lessons introduced by `Lesson N: Title`
//! markers, each optionally followed by a `Lesson Link:` line.

use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::RagError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub number: u32,
    pub title: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    pub link: Option<String>,
    pub instructor: Option<String>,
    pub lessons: Vec<Lesson>,
}

impl Course {
    pub fn lesson(&self, number: u32) -> Option<&Lesson> {
        self.lessons.iter().find(|lesson| lesson.number == number)
    }
}

/// A contiguous body of text belonging to one lesson, or to the course
/// itself when it precedes the first lesson marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub lesson_number: Option<u32>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCourse {
    pub course: Course,
    pub sections: Vec<Section>,
}

fn lesson_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"(?i)^lesson\s+(\d+)\s*:\s*(.*)$").expect("lesson marker regex is valid")
    })
}

/// Strips a case-insensitive `prefix` followed by a colon.
fn header_value<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    line[prefix.len()..]
        .trim_start()
        .strip_prefix(':')
        .map(str::trim)
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

pub async fn parse_course_file(path: &Path) -> Result<ParsedCourse, RagError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| RagError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_course(&path.display().to_string(), &text)
}

/// Parses course text. `source` only names the document in errors.
pub fn parse_course(source: &str, text: &str) -> Result<ParsedCourse, RagError> {
    let mut title: Option<String> = None;
    let mut link: Option<String> = None;
    let mut instructor: Option<String> = None;
    let mut intro: Vec<&str> = Vec::new();

    let mut lessons: Vec<Lesson> = Vec::new();
    let mut sections: Vec<Section> = Vec::new();
    let mut seen_numbers = HashSet::new();

    let mut current: Option<(Lesson, Vec<&str>)> = None;
    let mut expect_lesson_link = false;

    for raw in text.lines() {
        let line = raw.trim();

        if let Some(caps) = lesson_marker().captures(line) {
            if let Some((lesson, body)) = current.take() {
                finish_lesson(&mut lessons, &mut sections, lesson, &body);
            }
            let number: u32 = caps[1].parse().map_err(|_| {
                RagError::malformed(source, format!("lesson number out of range: {}", &caps[1]))
            })?;
            if !seen_numbers.insert(number) {
                return Err(RagError::malformed(
                    source,
                    format!("duplicate lesson number {}", number),
                ));
            }
            current = Some((
                Lesson {
                    number,
                    title: caps[2].trim().to_string(),
                    link: None,
                },
                Vec::new(),
            ));
            expect_lesson_link = true;
            continue;
        }

        match current.as_mut() {
            Some((lesson, body)) => {
                if expect_lesson_link {
                    expect_lesson_link = false;
                    if let Some(value) = header_value(line, "Lesson Link") {
                        lesson.link = non_empty(value);
                        continue;
                    }
                }
                body.push(raw);
            }
            None => {
                if let Some(value) = header_value(line, "Course Title") {
                    title = non_empty(value);
                } else if let Some(value) = header_value(line, "Course Link") {
                    link = non_empty(value);
                } else if let Some(value) = header_value(line, "Course Instructor") {
                    instructor = non_empty(value);
                } else {
                    intro.push(raw);
                }
            }
        }
    }

    if let Some((lesson, body)) = current.take() {
        finish_lesson(&mut lessons, &mut sections, lesson, &body);
    }

    let Some(title) = title else {
        return Err(RagError::malformed(
            source,
            "missing 'Course Title:' header line",
        ));
    };

    let intro_text = intro.join("\n").trim().to_string();
    if !intro_text.is_empty() {
        sections.insert(
            0,
            Section {
                lesson_number: None,
                text: intro_text,
            },
        );
    }

    Ok(ParsedCourse {
        course: Course {
            title,
            link,
            instructor,
            lessons,
        },
        sections,
    })
}

fn finish_lesson(
    lessons: &mut Vec<Lesson>,
    sections: &mut Vec<Section>,
    lesson: Lesson,
    body: &[&str],
) {
    let text = body.join("\n").trim().to_string();
    if !text.is_empty() {
        sections.push(Section {
            lesson_number: Some(lesson.number),
            text,
        });
    }
    lessons.push(lesson);
}
