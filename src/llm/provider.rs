use async_trait::async_trait;

use super::error::GenerationError;
use super::types::{MessagesRequest, MessagesResponse};

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// return the provider name (e.g. "anthropic")
    fn name(&self) -> &str;

    /// one Messages API round trip (non-streaming)
    async fn complete(
        &self,
        request: &MessagesRequest,
    ) -> Result<MessagesResponse, GenerationError>;
}
