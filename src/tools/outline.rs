use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::{input_schema, parse_args, Tool, ToolDefinition, ToolError, ToolOutput};
use crate::rag::{Course, CourseIndex, RagError, SourceCitation};

pub const OUTLINE_TOOL_NAME: &str = "get_course_outline";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct OutlineArgs {
    /// Course title (partial matches work, e.g. 'MCP', 'Introduction')
    pub course_title: String,
}

/// Returns a course's title, link, instructor and lesson list.
pub struct CourseOutlineTool {
    index: Arc<CourseIndex>,
}

impl CourseOutlineTool {
    pub fn new(index: Arc<CourseIndex>) -> Self {
        Self { index }
    }

    pub async fn outline(&self, course_title: &str) -> Result<ToolOutput, RagError> {
        match self.index.course_outline(course_title).await? {
            Some(course) => Ok(ToolOutput {
                content: render_outline(&course),
                sources: vec![SourceCitation::new(&course.title, None, course.link.clone())],
                ..ToolOutput::default()
            }),
            None => Ok(ToolOutput::empty(format!(
                "No course found matching '{}'",
                course_title
            ))),
        }
    }
}

fn render_outline(course: &Course) -> String {
    let mut lines = vec![format!("**{}**", course.title)];
    if let Some(instructor) = &course.instructor {
        lines.push(format!("Instructor: {}", instructor));
    }
    if let Some(link) = &course.link {
        lines.push(format!("Course Link: {}", link));
    }

    if !course.lessons.is_empty() {
        lines.push(String::new());
        lines.push(format!("Lessons ({}):", course.lessons.len()));
        for lesson in &course.lessons {
            match &lesson.link {
                Some(link) => lines.push(format!("{}. {} - {}", lesson.number, lesson.title, link)),
                None => lines.push(format!("{}. {}", lesson.number, lesson.title)),
            }
        }
    }

    lines.join("\n")
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: OUTLINE_TOOL_NAME.to_string(),
            description: "Get a course outline: title, course link, instructor and the numbered \
                          list of lessons"
                .to_string(),
            input_schema: input_schema::<OutlineArgs>(),
        }
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let args: OutlineArgs = parse_args(OUTLINE_TOOL_NAME, args)?;
        Ok(self.outline(&args.course_title).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::core::config::VectorStoreConfig;
    use crate::rag::index::test_support::KeywordEmbedder;
    use crate::rag::{Lesson, SqliteRagStore};

    async fn tool(dir: &tempfile::TempDir) -> CourseOutlineTool {
        let store = SqliteRagStore::with_path(dir.path().join("rag.db"))
            .await
            .unwrap();
        let index = CourseIndex::new(
            Arc::new(store),
            Arc::new(KeywordEmbedder::new(&["python", "rust"])),
            &VectorStoreConfig::default(),
        );
        index
            .add_course(&Course {
                title: "Python Programming".into(),
                link: Some("https://example.com/python".into()),
                instructor: Some("John Doe".into()),
                lessons: vec![
                    Lesson {
                        number: 1,
                        title: "Basics".into(),
                        link: Some("link1".into()),
                    },
                    Lesson {
                        number: 2,
                        title: "Functions".into(),
                        link: None,
                    },
                ],
            })
            .await
            .unwrap();
        CourseOutlineTool::new(Arc::new(index))
    }

    #[tokio::test]
    async fn renders_outline_for_partial_name() {
        let dir = tempfile::tempdir().unwrap();
        let out = tool(&dir).await.outline("Python").await.unwrap();

        assert!(out.content.starts_with("**Python Programming**"));
        assert!(out.content.contains("Instructor: John Doe"));
        assert!(out.content.contains("Course Link: https://example.com/python"));
        assert!(out.content.contains("1. Basics - link1"));
        assert!(out.content.contains("2. Functions"));
        assert_eq!(out.sources[0].label, "Python Programming");
    }

    #[tokio::test]
    async fn unknown_course() {
        let dir = tempfile::tempdir().unwrap();
        let out = tool(&dir).await.outline("Nonexistent Course").await.unwrap();
        assert!(out.empty);
        assert_eq!(out.content, "No course found matching 'Nonexistent Course'");
    }

    #[tokio::test]
    async fn definition_requires_course_title() {
        let dir = tempfile::tempdir().unwrap();
        let definition = tool(&dir).await.definition();
        assert_eq!(definition.name, "get_course_outline");
        assert_eq!(definition.input_schema["required"], json!(["course_title"]));
    }
}
