//! Text-to-speech client (ElevenLabs API).
//!
//! Synthesised audio comes back as a `data:audio/mpeg;base64,…` URL so it can
//! be stored inside the slide document the same way the rest of the styling
//! is; the exporter decodes it back to MP3 bytes. Duration is estimated from
//! word count (~150 words per minute) rather than decoding the MP3.

use crate::error::VslError;
use crate::model::{AudioSettings, SlideAudio};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const API_BASE: &str = "https://api.elevenlabs.io/v1";
const MODEL_ID: &str = "eleven_monolingual_v1";

/// Words per minute assumed by the duration estimate.
const WORDS_PER_MINUTE: f64 = 150.0;

/// One available voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voice {
    pub voice_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Character-quota information for the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub character_count: u64,
    pub character_limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    voices: Vec<VoiceRow>,
}

#[derive(Debug, Deserialize)]
struct VoiceRow {
    voice_id: String,
    name: String,
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionResponse {
    character_count: u64,
    character_limit: u64,
    tier: Option<String>,
}

/// ElevenLabs TTS client.
#[derive(Debug, Clone)]
pub struct ElevenLabsClient {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl ElevenLabsClient {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Result<Self, VslError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(VslError::MissingCredential {
                provider: "elevenlabs".into(),
                env_hint: "ELEVENLABS_API_KEY".into(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| VslError::Http {
                service: "elevenlabs".into(),
                detail: e.to_string(),
            })?;
        Ok(Self {
            api_key,
            client,
            base_url: API_BASE.to_string(),
        })
    }

    pub fn from_env(timeout_secs: u64) -> Result<Self, VslError> {
        let key = std::env::var("ELEVENLABS_API_KEY").map_err(|_| VslError::MissingCredential {
            provider: "elevenlabs".into(),
            env_hint: "ELEVENLABS_API_KEY".into(),
        })?;
        Self::new(key, timeout_secs)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Synthesise `text` with the given voice settings.
    pub async fn synthesize(
        &self,
        text: &str,
        settings: &AudioSettings,
    ) -> Result<SlideAudio, VslError> {
        let url = format!("{}/text-to-speech/{}", self.base_url, settings.voice_id);
        let body = json!({
            "text": text,
            "model_id": MODEL_ID,
            "voice_settings": {
                "stability": settings.stability,
                "similarity_boost": settings.similarity_boost,
                "speed": settings.speed,
            },
        });

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VslError::Http {
                service: "elevenlabs".into(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(VslError::Http {
                service: "elevenlabs".into(),
                detail: format!("{status} {detail}"),
            });
        }

        let audio = response.bytes().await.map_err(|e| VslError::Http {
            service: "elevenlabs".into(),
            detail: e.to_string(),
        })?;
        debug!("Synthesised {} bytes of audio", audio.len());

        Ok(SlideAudio {
            url: to_data_url(&audio),
            duration: estimate_duration_secs(text),
            generated: true,
        })
    }

    /// List available voices.
    pub async fn voices(&self) -> Result<Vec<Voice>, VslError> {
        let url = format!("{}/voices", self.base_url);
        let response: VoicesResponse = self.get_json(&url).await?;
        Ok(response
            .voices
            .into_iter()
            .map(|v| Voice {
                voice_id: v.voice_id,
                name: v.name,
                category: v.category,
            })
            .collect())
    }

    /// Fetch the account's character quota.
    pub async fn subscription(&self) -> Result<SubscriptionInfo, VslError> {
        let url = format!("{}/user/subscription", self.base_url);
        let response: SubscriptionResponse = self.get_json(&url).await?;
        Ok(SubscriptionInfo {
            character_count: response.character_count,
            character_limit: response.character_limit,
            tier: response.tier,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, VslError> {
        let response = self
            .client
            .get(url)
            .header("xi-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| VslError::Http {
                service: "elevenlabs".into(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(VslError::Http {
                service: "elevenlabs".into(),
                detail: format!("{status} {detail}"),
            });
        }

        response.json().await.map_err(|e| VslError::Http {
            service: "elevenlabs".into(),
            detail: e.to_string(),
        })
    }
}

/// Wrap MP3 bytes as a storable data-URL.
pub fn to_data_url(audio: &[u8]) -> String {
    format!("data:audio/mpeg;base64,{}", BASE64.encode(audio))
}

/// Estimate spoken duration from word count at ~150 wpm.
pub fn estimate_duration_secs(text: &str) -> f64 {
    let words = text.split_whitespace().count() as f64;
    words / WORDS_PER_MINUTE * 60.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_estimate_150_words_is_one_minute() {
        let text = vec!["word"; 150].join(" ");
        let secs = estimate_duration_secs(&text);
        assert!((secs - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn duration_estimate_empty_text() {
        assert_eq!(estimate_duration_secs(""), 0.0);
    }

    #[test]
    fn data_url_shape() {
        let url = to_data_url(b"ABC");
        assert!(url.starts_with("data:audio/mpeg;base64,"));
        assert!(url.ends_with("QUJD"));
    }

    #[test]
    fn missing_key_is_credential_error() {
        assert!(matches!(
            ElevenLabsClient::new("", 30),
            Err(VslError::MissingCredential { .. })
        ));
    }
}
