use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::{input_schema, parse_args, Tool, ToolDefinition, ToolError, ToolOutput};
use crate::rag::{CourseIndex, RagError, SearchFilters, SearchResult};

pub const SEARCH_TOOL_NAME: &str = "search_course_content";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchArgs {
    /// What to search for in the course content
    pub query: String,
    /// Course title (partial matches work, e.g. 'MCP', 'Introduction')
    #[serde(default)]
    pub course_name: Option<String>,
    /// Specific lesson number to search within (e.g. 1, 2, 3)
    #[serde(default)]
    pub lesson_number: Option<u32>,
}

/// Semantic search over course content with optional course and lesson
/// filters.
pub struct CourseSearchTool {
    index: Arc<CourseIndex>,
}

impl CourseSearchTool {
    pub fn new(index: Arc<CourseIndex>) -> Self {
        Self { index }
    }

    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> Result<ToolOutput, RagError> {
        let filters = SearchFilters {
            course_name: course_name
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            lesson_number,
        };
        let results = self
            .index
            .query(query, self.index.max_results(), &filters)
            .await?;

        if results.is_empty() {
            return Ok(ToolOutput::empty(empty_message(&filters)));
        }

        let mut sources = Vec::new();
        for result in &results {
            let citation = result.citation();
            if !sources.contains(&citation) {
                sources.push(citation);
            }
        }

        Ok(ToolOutput {
            content: format_results(&results),
            sources,
            ..ToolOutput::default()
        })
    }
}

fn format_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|result| {
            let header = match result.lesson_number {
                Some(number) => format!("[{} - Lesson {}]", result.course_title, number),
                None => format!("[{}]", result.course_title),
            };
            format!("{}\n{}", header, result.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn empty_message(filters: &SearchFilters) -> String {
    let mut message = String::from("No relevant content found");
    if let Some(name) = &filters.course_name {
        message.push_str(&format!(" in course '{}'", name));
    }
    if let Some(number) = filters.lesson_number {
        message.push_str(&format!(" in lesson {}", number));
    }
    message.push('.');
    message
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: SEARCH_TOOL_NAME.to_string(),
            description:
                "Search course materials with smart course name matching and lesson filtering"
                    .to_string(),
            input_schema: input_schema::<SearchArgs>(),
        }
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let args: SearchArgs = parse_args(SEARCH_TOOL_NAME, args)?;
        Ok(self
            .search(&args.query, args.course_name.as_deref(), args.lesson_number)
            .await?)
    }
}
