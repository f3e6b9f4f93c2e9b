//! Tools the model can call while answering.

pub mod outline;
pub mod search;

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::rag::{RagError, SourceCitation};

pub use outline::CourseOutlineTool;
pub use search::CourseSearchTool;

/// Tool declaration in the shape the Messages API expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub content: String,
    pub sources: Vec<SourceCitation>,
    /// The tool ran but found nothing relevant.
    pub empty: bool,
    /// The call itself was unusable (e.g. unknown tool); reported back to
    /// the model as an error result.
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn empty(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            empty: true,
            ..Self::default()
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error(transparent)]
    Rag(#[from] RagError),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError>;
}

/// JSON schema for a tool's argument struct, without the `$schema` and
/// `title` keys the API does not need.
pub fn input_schema<T: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut schema {
        map.remove("$schema");
        map.remove("title");
    }
    schema
}

/// Deserializes tool arguments, naming the tool on failure.
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

/// Tools in registration order, looked up by name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<(String, Arc<dyn Tool>)>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        match self.tools.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = tool,
            None => self.tools.push((name, tool)),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|(_, tool)| tool.definition()).collect()
    }

    /// Runs a tool by name. An unknown name is reported as an error result
    /// rather than failing the request.
    pub async fn execute(&self, name: &str, args: Value) -> Result<ToolOutput, ToolError> {
        match self.tools.iter().find(|(existing, _)| existing == name) {
            Some((_, tool)) => tool.execute(args).await,
            None => {
                tracing::warn!("Model requested unknown tool '{}'", name);
                Ok(ToolOutput::error(format!("Tool '{}' not found", name)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize, JsonSchema)]
    struct EchoArgs {
        /// Text to echo.
        text: String,
    }

    struct Echo(&'static str);

    #[async_trait]
    impl Tool for Echo {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".into(),
                description: self.0.into(),
                input_schema: input_schema::<EchoArgs>(),
            }
        }

        async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
            let args: EchoArgs = parse_args("echo", args)?;
            Ok(ToolOutput::text(format!("{}:{}", self.0, args.text)))
        }
    }

    #[test]
    fn schema_drops_meta_keys() {
        let schema = input_schema::<EchoArgs>();
        assert!(schema.get("$schema").is_none());
        assert!(schema.get("title").is_none());
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["text"]));
    }

    #[tokio::test]
    async fn registry_dispatches_and_replaces() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo("v1")));
        registry.register(Arc::new(Echo("v2")));

        assert_eq!(registry.names(), vec!["echo"]);
        let out = registry.execute("echo", json!({ "text": "hi" })).await.unwrap();
        assert_eq!(out.content, "v2:hi");
    }

    #[tokio::test]
    async fn unknown_tool_is_error_result() {
        let registry = ToolRegistry::new();
        let out = registry.execute("nope", json!({})).await.unwrap();
        assert!(out.is_error);
        assert_eq!(out.content, "Tool 'nope' not found");
    }

    #[tokio::test]
    async fn bad_arguments_are_reported() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo("v1")));
        let err = registry.execute("echo", json!({ "wrong": 1 })).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { ref tool, .. } if tool == "echo"));
    }
}
