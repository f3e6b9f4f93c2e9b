//! Answer generation with a bounded tool-use loop.
//!
//! Each round sends the conversation to the model. When the reply requests
//! tools, they are executed and their results appended as a user turn, then
//! the model is called again. Tools stop being offered once
//! `max_tool_rounds` rounds have run, or once a round only produced empty
//! results, so the following call has to answer in text.

use std::sync::Arc;

use serde_json::Value;

use super::error::GenerationError;
use super::provider::LlmProvider;
use super::types::{ContentBlock, Message, MessagesRequest, MessagesResponse, ToolChoice};
use crate::core::config::LlmConfig;
use crate::rag::SourceCitation;
use crate::tools::{ToolDefinition, ToolRegistry};

pub const SYSTEM_PROMPT: &str = "You are an AI assistant specialized in course materials and educational content with access to tools for course information.

Tool Usage Guidelines:
- **Course outline/structure questions**: Use get_course_outline to get the course title, instructor, course link and the complete lesson list with numbers, titles and links
- **Specific content questions**: Use search_course_content for detailed educational materials
- Use tools only when relevant to the query
- Synthesize tool results into accurate, fact-based responses
- If tools yield no results, state this clearly without offering alternatives

Response Protocol:
- **General knowledge questions**: Answer using existing knowledge without using tools
- **Course outline questions**: Use get_course_outline first, then present the course information
- **Course content questions**: Use search_course_content first, then answer
- **No meta-commentary**: Provide direct answers only. Do not explain your reasoning or mention the tools or their results.

All responses must be:
1. **Brief, concise and focused**
2. **Educational**
3. **Clear**
4. **Example-supported** when examples aid understanding
Provide only the direct answer to what was asked.";

pub const FALLBACK_ANSWER: &str =
    "I wasn't able to produce an answer to that question. Please try rephrasing it.";

/// System prompt, with prior conversation appended when there is any.
pub fn system_prompt(history: Option<&str>) -> String {
    match history.filter(|h| !h.trim().is_empty()) {
        Some(history) => format!("{}\n\nPrevious conversation:\n{}", SYSTEM_PROMPT, history),
        None => SYSTEM_PROMPT.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub text: String,
    /// Citations from every tool call, de-duplicated, in first-seen order.
    pub sources: Vec<SourceCitation>,
    /// Tool rounds executed.
    pub rounds: usize,
}

struct ToolCall {
    id: String,
    name: String,
    input: Value,
}

pub struct Generator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    max_tool_rounds: usize,
}

impl Generator {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_tool_rounds: config.max_tool_rounds,
        }
    }

    fn request(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> MessagesRequest {
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: system.to_string(),
            messages: messages.to_vec(),
            tools: tools.to_vec(),
            tool_choice: (!tools.is_empty()).then_some(ToolChoice::Auto),
        }
    }

    pub async fn generate(
        &self,
        query: &str,
        history: Option<&str>,
        tools: &ToolRegistry,
    ) -> Result<Generated, GenerationError> {
        let system = system_prompt(history);
        let definitions = tools.definitions();
        let mut messages = vec![Message::user_text(query)];
        let mut sources: Vec<SourceCitation> = Vec::new();
        let mut rounds = 0usize;
        let mut offer_tools = !definitions.is_empty() && self.max_tool_rounds > 0;

        loop {
            let offered: &[ToolDefinition] = if offer_tools { &definitions } else { &[] };
            let response = self
                .provider
                .complete(&self.request(&system, &messages, offered))
                .await?;

            if !offer_tools || !response.has_tool_use() {
                return Ok(Generated {
                    text: final_text(&response),
                    sources,
                    rounds,
                });
            }

            let calls = tool_calls(&response)?;
            rounds += 1;
            tracing::debug!("Tool round {} with {} call(s)", rounds, calls.len());

            let mut results = Vec::with_capacity(calls.len());
            let mut all_empty = true;
            for call in calls {
                let output = tools.execute(&call.name, call.input).await?;
                all_empty &= output.empty;
                for source in output.sources {
                    if !sources.contains(&source) {
                        sources.push(source);
                    }
                }
                results.push(ContentBlock::ToolResult {
                    tool_use_id: call.id,
                    content: output.content,
                    is_error: output.is_error,
                });
            }

            messages.push(Message::assistant(&response.content));
            messages.push(Message::user(results));

            if rounds >= self.max_tool_rounds || all_empty {
                offer_tools = false;
            }
        }
    }
}

fn final_text(response: &MessagesResponse) -> String {
    let text = response.text();
    if text.trim().is_empty() {
        tracing::warn!("Model returned no text; using fallback answer");
        FALLBACK_ANSWER.to_string()
    } else {
        text.trim().to_string()
    }
}

fn tool_calls(response: &MessagesResponse) -> Result<Vec<ToolCall>, GenerationError> {
    response
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some((id, name, input)),
            _ => None,
        })
        .map(|(id, name, input)| {
            if id.is_empty() || name.is_empty() {
                return Err(GenerationError::MalformedToolCall(
                    "tool_use block without id or name".to_string(),
                ));
            }
            if !input.is_object() {
                return Err(GenerationError::MalformedToolCall(format!(
                    "input for '{}' is not an object",
                    name
                )));
            }
            Ok(ToolCall {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            })
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::test_support::*;
    use super::*;
    use crate::rag::RagError;
    use crate::tools::{input_schema, Tool, ToolError, ToolOutput};

    #[derive(serde::Deserialize, schemars::JsonSchema)]
    struct QueryArgs {
        query: String,
    }

    /// Search stand-in: empty for queries containing "nothing", a store
    /// failure for "outage", otherwise one cited hit.
    struct FakeSearch;

    #[async_trait]
    impl Tool for FakeSearch {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "search_course_content".into(),
                description: "search".into(),
                input_schema: input_schema::<QueryArgs>(),
            }
        }

        async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
            let query = crate::tools::parse_args::<QueryArgs>("search_course_content", args)?.query;
            if query.contains("outage") {
                return Err(RagError::StoreUnavailable("db down".into()).into());
            }
            if query.contains("nothing") {
                return Ok(ToolOutput::empty("No relevant content found."));
            }
            Ok(ToolOutput {
                content: format!("[Course A - Lesson 1]\nabout {}", query),
                sources: vec![SourceCitation::new("Course A", Some(1), None)],
                ..ToolOutput::default()
            })
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FakeSearch));
        registry
    }

    fn generator(provider: Arc<ScriptedProvider>, rounds: usize) -> Generator {
        let config = LlmConfig {
            max_tool_rounds: rounds,
            ..LlmConfig::default()
        };
        Generator::new(provider, &config)
    }

    #[tokio::test]
    async fn direct_answer_uses_one_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(text_reply("Paris."))]));
        let generated = generator(provider.clone(), 2)
            .generate("capital of France?", None, &registry())
            .await
            .unwrap();

        assert_eq!(generated.text, "Paris.");
        assert_eq!(generated.rounds, 0);
        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].offers_tools());
        assert_eq!(requests[0].tool_choice, Some(ToolChoice::Auto));
        assert_eq!(requests[0].temperature, 0.0);
        assert_eq!(requests[0].max_tokens, 800);
    }

    #[tokio::test]
    async fn tool_round_feeds_results_back() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(search_reply("tu_1", "ownership")),
            Ok(text_reply("Ownership means...")),
        ]));
        let generated = generator(provider.clone(), 2)
            .generate("what is ownership", None, &registry())
            .await
            .unwrap();

        assert_eq!(generated.text, "Ownership means...");
        assert_eq!(generated.rounds, 1);
        assert_eq!(generated.sources[0].label, "Course A - Lesson 1");

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        let second = &requests[1].messages;
        assert_eq!(second.len(), 3);
        assert!(matches!(
            &second[2].content[0],
            ContentBlock::ToolResult { tool_use_id, content, is_error: false }
                if tool_use_id == "tu_1" && content.contains("about ownership")
        ));
    }

    #[tokio::test]
    async fn stops_offering_tools_after_max_rounds() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(search_reply("tu_1", "a")),
            Ok(search_reply("tu_2", "b")),
            Ok(search_reply("tu_3", "c")),
            Ok(text_reply("final")),
        ]));
        let generated = generator(provider.clone(), 2)
            .generate("q", None, &registry())
            .await
            .unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].offers_tools());
        assert!(requests[1].offers_tools());
        assert!(!requests[2].offers_tools());
        assert_eq!(generated.rounds, 2);
        // The third reply still asked for a tool; with tools withdrawn it has
        // no text, so the fallback is returned.
        assert_eq!(generated.text, FALLBACK_ANSWER);
        assert_eq!(generated.sources.len(), 1);
    }

    #[tokio::test]
    async fn empty_round_withdraws_tools() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(search_reply("tu_1", "nothing here")),
            Ok(text_reply("No course material covers that.")),
        ]));
        let generated = generator(provider.clone(), 2)
            .generate("q", None, &registry())
            .await
            .unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert!(!requests[1].offers_tools());
        assert!(generated.sources.is_empty());
        assert_eq!(generated.text, "No course material covers that.");
    }

    #[tokio::test]
    async fn history_goes_into_system_prompt() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(text_reply("ok"))]));
        generator(provider.clone(), 2)
            .generate("q", Some("User: hi\nAssistant: hello"), &registry())
            .await
            .unwrap();

        let system = &provider.requests()[0].system;
        assert!(system.starts_with(SYSTEM_PROMPT));
        assert!(system.ends_with("\n\nPrevious conversation:\nUser: hi\nAssistant: hello"));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_model() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(tool_reply("tu_1", "delete_everything", json!({}))),
            Ok(text_reply("Sorry.")),
        ]));
        let generated = generator(provider.clone(), 2)
            .generate("q", None, &registry())
            .await
            .unwrap();

        assert_eq!(generated.text, "Sorry.");
        let requests = provider.requests();
        assert!(matches!(
            &requests[1].messages[2].content[0],
            ContentBlock::ToolResult { content, is_error: true, .. }
                if content == "Tool 'delete_everything' not found"
        ));
    }

    #[tokio::test]
    async fn malformed_tool_calls_fail() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(tool_reply(
            "",
            "search_course_content",
            json!({ "query": "x" }),
        ))]));
        let err = generator(provider, 2)
            .generate("q", None, &registry())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::MalformedToolCall(_)));

        let provider = Arc::new(ScriptedProvider::new(vec![Ok(tool_reply(
            "tu_1",
            "search_course_content",
            json!({ "wrong": 1 }),
        ))]));
        let err = generator(provider, 2)
            .generate("q", None, &registry())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::MalformedToolCall(_)));
    }

    #[tokio::test]
    async fn store_failure_in_tool_propagates() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(search_reply("tu_1", "outage"))]));
        let err = generator(provider, 2)
            .generate("q", None, &registry())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Tool(RagError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn api_errors_propagate() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(GenerationError::Api {
            status: 401,
            message: "invalid x-api-key".into(),
        })]));
        let err = generator(provider, 2)
            .generate("q", None, &registry())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn zero_rounds_never_offers_tools() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(text_reply("plain"))]));
        generator(provider.clone(), 0)
            .generate("q", None, &registry())
            .await
            .unwrap();
        assert!(!provider.requests()[0].offers_tools());
    }
}
