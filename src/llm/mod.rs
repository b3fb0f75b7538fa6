//! Language-model clients.
//!
//! Every LLM-backed stage talks through the [`LanguageModel`] trait so tests
//! can substitute scripted fakes and the pipeline never knows which vendor is
//! answering. Two real clients ship: [`AnthropicModel`] (primary) and
//! [`OpenAiModel`] (fallback), combined by [`FallbackModel`] which tries the
//! primary and falls through on any error.

mod anthropic;
mod openai;

pub use anthropic::AnthropicModel;
pub use openai::OpenAiModel;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// A single-turn completion request.
///
/// The pipeline only ever sends one user message; stages encode everything
/// into the prompt (see [`crate::prompts`]).
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
    pub prompt: String,
}

/// Errors from a language-model call.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// The API answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The request never completed (DNS, TLS, timeout, connection reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// A 2xx response with no usable text content.
    #[error("empty completion from model")]
    EmptyCompletion,

    /// The client was constructed without a credential.
    #[error("provider '{0}' is not configured (missing API key)")]
    NotConfigured(String),
}

/// A chat-completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one completion and return the raw text.
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError>;

    /// Short provider name for logs ("anthropic", "openai", …).
    fn name(&self) -> &'static str;
}

/// Primary-then-secondary combinator.
///
/// On any primary error the secondary is tried with the same request; when
/// both fail, the *primary* error is returned — the caller configured the
/// primary deliberately and its error is the one worth reading.
pub struct FallbackModel {
    primary: Arc<dyn LanguageModel>,
    secondary: Arc<dyn LanguageModel>,
}

impl FallbackModel {
    pub fn new(primary: Arc<dyn LanguageModel>, secondary: Arc<dyn LanguageModel>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl LanguageModel for FallbackModel {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let primary_err = match self.primary.complete(request).await {
            Ok(text) => return Ok(text),
            Err(e) => e,
        };

        warn!(
            "{} failed ({}), attempting {} fallback",
            self.primary.name(),
            primary_err,
            self.secondary.name()
        );

        match self.secondary.complete(request).await {
            Ok(text) => Ok(text),
            Err(secondary_err) => {
                warn!("{} fallback also failed: {}", self.secondary.name(), secondary_err);
                Err(primary_err)
            }
        }
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<String, LlmError>);

    #[async_trait]
    impl LanguageModel for Fixed {
        async fn complete(&self, _request: &ChatRequest) -> Result<String, LlmError> {
            self.0.clone()
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "claude-3-5-haiku-20241022".into(),
            max_tokens: 256,
            temperature: None,
            prompt: "hi".into(),
        }
    }

    #[tokio::test]
    async fn fallback_uses_secondary_on_primary_error() {
        let m = FallbackModel::new(
            Arc::new(Fixed(Err(LlmError::Transport("down".into())))),
            Arc::new(Fixed(Ok("from secondary".into()))),
        );
        assert_eq!(m.complete(&request()).await.unwrap(), "from secondary");
    }

    #[tokio::test]
    async fn fallback_returns_primary_error_when_both_fail() {
        let m = FallbackModel::new(
            Arc::new(Fixed(Err(LlmError::Api {
                status: 402,
                message: "billing".into(),
            }))),
            Arc::new(Fixed(Err(LlmError::Transport("also down".into())))),
        );
        match m.complete(&request()).await {
            Err(LlmError::Api { status, .. }) => assert_eq!(status, 402),
            other => panic!("expected the primary error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fallback_skips_secondary_on_success() {
        let m = FallbackModel::new(
            Arc::new(Fixed(Ok("primary".into()))),
            Arc::new(Fixed(Err(LlmError::Transport("unused".into())))),
        );
        assert_eq!(m.complete(&request()).await.unwrap(), "primary");
    }
}
