//! Generation provider
//!
//! Async trait over role-tagged chat completion, with an OpenAI-compatible
//! HTTP client (Groq by default). Failures are surfaced to the orchestrator,
//! which masks them with its canned-fallback policy; nothing here retries.

use crate::config::LlmConfig;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("API key missing: environment variable {0} is not set")]
    ApiKeyMissing(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Provider returned no choices")]
    EmptyResponse,
}

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Trait for generation providers.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, GenerationError>;
}

/// OpenAI-compatible chat completions client.
///
/// Works against any endpoint speaking the `/chat/completions` protocol;
/// the defaults target Groq. The API key is read from the configured
/// environment variable at call time, never stored in configuration.
pub struct OpenAiCompatibleClient {
    base_url: String,
    model: String,
    api_key_env: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key_env: config.api_key_env.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl GenerationProvider for OpenAiCompatibleClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, GenerationError> {
        let api_key = std::env::var(&self.api_key_env)
            .map_err(|_| GenerationError::ApiKeyMissing(self.api_key_env.clone()))?;

        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "top_p": 0.9,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Http(format!("{}: {}", url, e)))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| GenerationError::Http(e.to_string()))?;

        payload["choices"]
            .get(0)
            .and_then(|c| c["message"]["content"].as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_serialize_with_lowercase_roles() {
        let msg = ChatMessage::system("be helpful");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "system");
        assert_eq!(value["content"], "be helpful");

        let value = serde_json::to_value(ChatMessage::assistant("hi")).unwrap();
        assert_eq!(value["role"], "assistant");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_an_error() {
        let config = LlmConfig {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "gemma2-9b-it".to_string(),
            api_key_env: "TUTORAG_TEST_KEY_THAT_DOES_NOT_EXIST".to_string(),
            temperature: 0.7,
            max_tokens: 500,
        };
        let client = OpenAiCompatibleClient::new(&config);
        let result = client.complete(&[ChatMessage::user("hello")]).await;
        assert!(matches!(result, Err(GenerationError::ApiKeyMissing(_))));
    }
}
