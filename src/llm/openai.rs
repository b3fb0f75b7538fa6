//! OpenAI chat-completions client, used as the fallback behind
//! [`super::FallbackModel`].
//!
//! Stage configs name Anthropic model ids; when a request reaches this client
//! the id is mapped to the closest OpenAI tier so callers never need two
//! model settings.

use super::{ChatRequest, LanguageModel, LlmError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const CHAT_COMPLETIONS_API: &str = "https://api.openai.com/v1/chat/completions";

/// Client for the OpenAI chat-completions API.
#[derive(Debug, Clone)]
pub struct OpenAiModel {
    api_key: String,
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Map a cross-vendor model id onto an OpenAI model.
///
/// Haiku-class ids go to the mini tier, sonnet/opus-class to the full tier;
/// ids that already look like OpenAI models pass through.
pub fn equivalent_model(model: &str) -> &str {
    if model.starts_with("gpt-") {
        return model;
    }
    if model.contains("haiku") {
        "gpt-4o-mini"
    } else {
        "gpt-4o"
    }
}

impl OpenAiModel {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(LlmError::NotConfigured("openai".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        Ok(Self {
            api_key,
            client,
            endpoint: CHAT_COMPLETIONS_API.to_string(),
        })
    }

    /// Build a client reading `OPENAI_API_KEY` from the environment.
    pub fn from_env(timeout_secs: u64) -> Result<Self, LlmError> {
        let key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| LlmError::NotConfigured("openai".into()))?;
        Self::new(key, timeout_secs)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let mut body = json!({
            "model": equivalent_model(&request.model),
            "max_tokens": request.max_tokens,
            "messages": [
                { "role": "user", "content": request.prompt }
            ],
        });
        if let Some(t) = request.temperature {
            body["temperature"] = json!(t);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.is_empty())
            .ok_or(LlmError::EmptyCompletion)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_mapping() {
        assert_eq!(equivalent_model("claude-3-5-haiku-20241022"), "gpt-4o-mini");
        assert_eq!(equivalent_model("claude-sonnet-4-20250514"), "gpt-4o");
        assert_eq!(equivalent_model("claude-3-opus-20240229"), "gpt-4o");
        assert_eq!(equivalent_model("gpt-4o-mini"), "gpt-4o-mini");
    }

    #[test]
    fn empty_key_is_not_configured() {
        assert!(matches!(
            OpenAiModel::new("", 60),
            Err(LlmError::NotConfigured(_))
        ));
    }
}
