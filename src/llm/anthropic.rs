use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::error::GenerationError;
use super::provider::LlmProvider;
use super::types::{MessagesRequest, MessagesResponse};
use crate::core::config::LlmConfig;

/// Client for the Anthropic Messages API.
#[derive(Clone)]
pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    api_version: String,
    client: Client,
    max_retries: u32,
    retry_backoff: Duration,
}

impl AnthropicProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            client,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    async fn send_once(
        &self,
        request: &MessagesRequest,
    ) -> Result<MessagesResponse, GenerationError> {
        let url = format!("{}/v1/messages", self.base_url);
        let res = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(request)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let body = res
            .text()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| GenerationError::MalformedResponse(e.to_string()))
    }
}

/// Pulls `error.message` out of an API error body, falling back to the raw
/// text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        request: &MessagesRequest,
    ) -> Result<MessagesResponse, GenerationError> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(request).await {
                Ok(response) => {
                    if let Some(usage) = response.usage {
                        tracing::debug!(
                            input_tokens = usage.input_tokens,
                            output_tokens = usage.output_tokens,
                            "Messages API call complete"
                        );
                    }
                    return Ok(response);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.retry_backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    tracing::warn!(
                        "Messages API call failed ({}), retry {}/{} in {:?}",
                        e,
                        attempt,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
