//! OpenRouter-backed `LlmProvider` (`§6.4`). Grounded on the teacher's
//! `OpenAIProtocolLlmDriver`: same request-building shape and the same
//! status-check-then-error-text failure path, applied to a single
//! non-streaming chat completion instead of an SSE stream.

use std::time::Duration;

use async_trait::async_trait;
use mta_core::error::{EngineError, Result};
use mta_core::traits::{ChatRequest, ChatResponse, LlmProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Clone)]
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    api_url: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("reqwest client builds with static config"),
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    /// `§6.7`: `OPENROUTER_API_KEY` must be set for the engine to reach the target LLM.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| EngineError::llm("OPENROUTER_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self { client: Client::new(), api_key: api_key.into(), api_url: api_url.into() }
    }
}

#[derive(Debug, Serialize)]
struct OpenRouterMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenRouterRequest {
    model: String,
    messages: Vec<OpenRouterMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponse {
    #[serde(default)]
    choices: Vec<OpenRouterChoice>,
    #[serde(default)]
    usage: Option<OpenRouterUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChoice {
    message: OpenRouterResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let mut messages = vec![OpenRouterMessage { role: "system", content: request.system }];
        for m in request.messages {
            messages.push(OpenRouterMessage { role: m.role, content: m.content });
        }

        let body = OpenRouterRequest {
            model: request.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::llm(format!("failed to send request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EngineError::llm(format!("openrouter error ({status}): {error_text}")));
        }

        let parsed: OpenRouterResponse = response
            .json()
            .await
            .map_err(|e| EngineError::llm(format!("failed to decode response body: {e}")))?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            warn!("openrouter response had no choices");
            EngineError::llm("openrouter returned no choices")
        })?;

        Ok(ChatResponse {
            text: choice.message.content.unwrap_or_default(),
            usage: parsed.usage.map(|u| (u.prompt_tokens, u.completion_tokens)),
            finish_reason: choice.finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_fails_cleanly_without_the_key() {
        std::env::remove_var("OPENROUTER_API_KEY");
        assert!(OpenRouterProvider::from_env().is_err());
    }

    #[test]
    fn with_base_url_overrides_the_default_endpoint() {
        let provider = OpenRouterProvider::with_base_url("key", "https://example.test/v1/chat");
        assert_eq!(provider.api_url, "https://example.test/v1/chat");
    }
}
