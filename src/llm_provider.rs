// src/llm_provider.rs
// Chat-completion provider abstraction. The concrete provider speaks the
// OpenAI chat-completions wire format; tests swap in a mock through the
// trait seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Settings for the remote completion model, loaded once from the
/// environment and passed in explicitly.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4-turbo".to_string(),
            temperature: 0.5,
            max_output_tokens: 2000,
        }
    }
}

/// One generic failure class: the wrapper does not distinguish auth,
/// quota, or network subtypes beyond the carried message.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("LLM connection failed: {0}")]
    ConnectionFailed(String),
    #[error("invalid LLM response: {0}")]
    InvalidResponse(String),
    #[error("generation failed: {0}")]
    GenerationFailed(String),
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// One blocking completion call: system instruction + user content in,
    /// the model's reply text out, verbatim apart from trimming.
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
    fn model_name(&self) -> &str;
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// OpenAI-compatible provider over reqwest.
pub struct OpenAiProvider {
    settings: LlmSettings,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        debug!(
            model = %self.settings.model,
            system_len = system.len(),
            user_len = user.len(),
            "Requesting completion"
        );

        let url = format!("{}/v1/chat/completions", self.settings.base_url);
        let req = ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user.to_string(),
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_output_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::GenerationFailed(format!(
                "{}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("empty choices".to_string()))?;

        info!(
            model = %self.settings.model,
            response_len = content.len(),
            "Completion received"
        );
        Ok(content.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.settings.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = LlmSettings::default();
        assert_eq!(settings.model, "gpt-4-turbo");
        assert_eq!(settings.temperature, 0.5);
        assert_eq!(settings.max_output_tokens, 2000);
    }

    #[test]
    fn test_provider_creation() {
        let provider = OpenAiProvider::new(LlmSettings::default());
        assert_eq!(provider.model_name(), "gpt-4-turbo");
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::ConnectionFailed("refused".to_string());
        assert!(format!("{}", err).contains("connection failed"));
        let err = LlmError::GenerationFailed("401 Unauthorized: bad key".to_string());
        assert!(format!("{}", err).contains("bad key"));
    }
}
