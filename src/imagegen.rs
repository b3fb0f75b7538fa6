//! AI image generation for the manual "generate instead of search" path.
//!
//! Two providers: OpenAI images (hosted URL) and Gemini/Imagen (base64 bytes
//! returned inline, wrapped as a data-URL so both providers hand the caller
//! the same shape). Both get the same realism prefix on the prompt.

use crate::error::VslError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const OPENAI_IMAGES_API: &str = "https://api.openai.com/v1/images/generations";
const GEMINI_PREDICT_API: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/imagen-3.0-generate-002:predict";

const PROMPT_PREFIX: &str = "Ultra realistic, professional: ";

/// Which backend renders the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageProvider {
    Openai,
    Gemini,
}

/// A generated image: either a hosted URL or a data-URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub image_url: String,
    pub provider: ImageProvider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiImagesResponse {
    #[serde(default)]
    data: Vec<OpenAiImage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiImage {
    url: Option<String>,
    revised_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiPredictResponse {
    #[serde(default)]
    predictions: Vec<GeminiPrediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPrediction {
    bytes_base64_encoded: Option<String>,
}

/// Image-generation client for one provider.
#[derive(Debug, Clone)]
pub struct ImageGenClient {
    provider: ImageProvider,
    api_key: String,
    client: reqwest::Client,
}

impl ImageGenClient {
    pub fn new(
        provider: ImageProvider,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, VslError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            let (name, hint) = match provider {
                ImageProvider::Openai => ("openai", "OPENAI_API_KEY"),
                ImageProvider::Gemini => ("gemini", "GEMINI_API_KEY"),
            };
            return Err(VslError::MissingCredential {
                provider: name.into(),
                env_hint: hint.into(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| VslError::Http {
                service: "imagegen".into(),
                detail: e.to_string(),
            })?;
        Ok(Self {
            provider,
            api_key,
            client,
        })
    }

    /// Generate one 16:9 image for `prompt`.
    pub async fn generate(&self, prompt: &str) -> Result<GeneratedImage, VslError> {
        match self.provider {
            ImageProvider::Openai => self.generate_openai(prompt).await,
            ImageProvider::Gemini => self.generate_gemini(prompt).await,
        }
    }

    async fn generate_openai(&self, prompt: &str) -> Result<GeneratedImage, VslError> {
        let body = json!({
            "model": "dall-e-3",
            "prompt": format!("{PROMPT_PREFIX}{prompt}"),
            "n": 1,
            "size": "1792x1024",
            "quality": "hd",
            "style": "natural",
        });

        let response = self
            .client
            .post(OPENAI_IMAGES_API)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| http_error("openai-images", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(http_error("openai-images", format!("{status} {detail}")));
        }

        let parsed: OpenAiImagesResponse = response
            .json()
            .await
            .map_err(|e| http_error("openai-images", e.to_string()))?;

        let image = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| http_error("openai-images", "no image in response".into()))?;
        let image_url = image
            .url
            .ok_or_else(|| http_error("openai-images", "no image URL in response".into()))?;

        Ok(GeneratedImage {
            image_url,
            provider: ImageProvider::Openai,
            revised_prompt: image.revised_prompt,
        })
    }

    async fn generate_gemini(&self, prompt: &str) -> Result<GeneratedImage, VslError> {
        let body = json!({
            "instances": [
                { "prompt": format!("{PROMPT_PREFIX}{prompt}") }
            ],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": "16:9",
            },
        });

        let response = self
            .client
            .post(GEMINI_PREDICT_API)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| http_error("gemini-imagen", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(http_error("gemini-imagen", format!("{status} {detail}")));
        }

        let parsed: GeminiPredictResponse = response
            .json()
            .await
            .map_err(|e| http_error("gemini-imagen", e.to_string()))?;

        let bytes = parsed
            .predictions
            .into_iter()
            .next()
            .and_then(|p| p.bytes_base64_encoded)
            .ok_or_else(|| http_error("gemini-imagen", "no image in response".into()))?;

        Ok(GeneratedImage {
            image_url: format!("data:image/png;base64,{bytes}"),
            provider: ImageProvider::Gemini,
            revised_prompt: None,
        })
    }
}

fn http_error(service: &str, detail: String) -> VslError {
    VslError::Http {
        service: service.to_string(),
        detail,
    }
}
