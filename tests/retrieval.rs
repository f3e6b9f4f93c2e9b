mod common;

use std::sync::Arc;

use serde_json::json;

use course_rag_backend::core::config::AppConfig;
use course_rag_backend::llm::generator::FALLBACK_ANSWER;
use course_rag_backend::llm::types::ContentBlock;
use course_rag_backend::rag::SearchFilters;
use course_rag_backend::tools::CourseSearchTool;

use common::*;

#[tokio::test]
async fn course_filter_never_leaks_other_courses() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = loaded_assistant(dir.path(), ScriptedProvider::new(vec![])).await;

    let filters = SearchFilters {
        course_name: Some("Rust Fundamentals".into()),
        lesson_number: None,
    };
    // "mcp server tools" matches the MCP course far better, but the filter wins.
    let results = assistant
        .index()
        .query("mcp server tools", 10, &filters)
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.course_title == "Rust Fundamentals"));

    let lesson = SearchFilters {
        course_name: Some("mcp".into()),
        lesson_number: Some(2),
    };
    let results = assistant.index().query("server", 10, &lesson).await.unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| {
        r.course_title == "MCP: Build Rich-Context AI Apps" && r.lesson_number == Some(2)
    }));
}

#[tokio::test]
async fn loading_twice_adds_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = loaded_assistant(dir.path(), ScriptedProvider::new(vec![])).await;
    let store = assistant.index().store().clone();
    let before = store.chunk_count().await.unwrap();

    let report = assistant
        .load_course_folder(&dir.path().join("docs"), false)
        .await
        .unwrap();
    assert_eq!(report.courses_added, 0);
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(store.chunk_count().await.unwrap(), before);
    assert_eq!(assistant.index().course_count().await.unwrap(), 2);
}

#[tokio::test]
async fn search_tool_cites_lessons_with_links() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = loaded_assistant(dir.path(), ScriptedProvider::new(vec![])).await;
    let tool = CourseSearchTool::new(assistant.index().clone());

    let output = tool
        .search("ownership owner", Some("Rust"), Some(1))
        .await
        .unwrap();
    assert!(output.content.starts_with("[Rust Fundamentals - Lesson 1]\n"));
    assert_eq!(output.sources.len(), 1);
    assert_eq!(output.sources[0].label, "Rust Fundamentals - Lesson 1");
    assert_eq!(output.sources[0].link.as_deref(), Some("https://example.com/rust/1"));
}

#[tokio::test]
async fn unmatched_course_gets_one_search_and_a_plain_answer() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![
        Ok(search(
            "tu_1",
            json!({ "query": "recipes", "course_name": "Cooking" }),
        )),
        Ok(text("There is no cooking course in the materials.")),
    ]);
    let assistant = loaded_assistant(dir.path(), provider.clone()).await;

    let answer = assistant.answer("What recipes are in Cooking?", None).await.unwrap();
    assert_eq!(answer.answer, "There is no cooking course in the materials.");
    assert!(answer.sources.is_empty());

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert!(!requests[1].offers_tools());
    assert!(matches!(
        &requests[1].messages[2].content[0],
        ContentBlock::ToolResult { content, .. }
            if content == "No relevant content found in course 'Cooking'."
    ));
}

#[tokio::test]
async fn tool_rounds_are_bounded_by_config() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![
        Ok(search("tu_1", json!({ "query": "ownership", "course_name": "Rust" }))),
        Ok(search("tu_2", json!({ "query": "borrow", "course_name": "Rust" }))),
        Ok(search("tu_3", json!({ "query": "rust", "course_name": "Rust" }))),
        Ok(text("never reached")),
    ]);
    let config = AppConfig::default();
    assert_eq!(config.llm.max_tool_rounds, 2);
    let assistant =
        assistant_with(dir.path(), &config, Arc::new(KeywordEmbedder), provider.clone()).await;
    assistant
        .load_course_folder(&write_docs(dir.path()), false)
        .await
        .unwrap();

    let answer = assistant.answer("Explain Rust memory", None).await.unwrap();
    let requests = provider.requests();

    assert_eq!(requests.len(), 3);
    assert_eq!(
        requests.iter().filter(|r| r.offers_tools()).count(),
        2,
        "only the first two calls may offer tools"
    );
    // The third reply asks for a tool that is no longer offered.
    assert_eq!(answer.answer, FALLBACK_ANSWER);
    assert!(!answer.sources.is_empty());
    assert!(answer
        .sources
        .iter()
        .all(|s| s.label.starts_with("Rust Fundamentals")));
}

#[tokio::test]
async fn sessions_keep_the_last_two_exchanges() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new(vec![
        Ok(text("a1")),
        Ok(text("a2")),
        Ok(text("a3")),
        Ok(text("a4")),
    ]);
    let assistant = loaded_assistant(dir.path(), provider.clone()).await;

    let id = assistant.answer("q1", None).await.unwrap().session_id;
    for q in ["q2", "q3", "q4"] {
        assistant.answer(q, Some(id.clone())).await.unwrap();
    }

    let system = &provider.requests()[3].system;
    assert!(system.contains("User: q2\nAssistant: a2\nUser: q3\nAssistant: a3"));
    assert!(!system.contains("q1"));
    assert_eq!(assistant.sessions().get_history(&id).await.len(), 4);
}
