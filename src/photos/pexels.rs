//! Pexels search client (primary provider).

use super::{Photo, PhotoError, StockPhotoProvider};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const SEARCH_API: &str = "https://api.pexels.com/v1/search";

#[derive(Debug, Clone)]
pub struct PexelsClient {
    api_key: String,
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Debug, Deserialize)]
struct PexelsPhoto {
    src: PexelsSrc,
    photographer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PexelsSrc {
    large2x: String,
    medium: Option<String>,
}

impl PexelsClient {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Result<Self, PhotoError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(PhotoError::NotConfigured { provider: "pexels" });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PhotoError::Transport {
                provider: "pexels",
                detail: e.to_string(),
            })?;
        Ok(Self {
            api_key,
            client,
            endpoint: SEARCH_API.to_string(),
        })
    }

    pub fn from_env(timeout_secs: u64) -> Result<Self, PhotoError> {
        let key = std::env::var("PEXELS_API_KEY")
            .map_err(|_| PhotoError::NotConfigured { provider: "pexels" })?;
        Self::new(key, timeout_secs)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl StockPhotoProvider for PexelsClient {
    async fn search(&self, query: &str, per_page: usize) -> Result<Vec<Photo>, PhotoError> {
        let response = self
            .client
            .get(&self.endpoint)
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", query),
                ("per_page", &per_page.to_string()),
                ("orientation", "landscape"),
            ])
            .send()
            .await
            .map_err(|e| PhotoError::Transport {
                provider: "pexels",
                detail: e.to_string(),
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(PhotoError::RateLimited { provider: "pexels" });
        }
        if !status.is_success() {
            return Err(PhotoError::Api {
                provider: "pexels",
                status: status.as_u16(),
            });
        }

        let parsed: SearchResponse =
            response.json().await.map_err(|e| PhotoError::Transport {
                provider: "pexels",
                detail: e.to_string(),
            })?;

        Ok(parsed
            .photos
            .into_iter()
            .map(|p| Photo {
                url: p.src.large2x,
                thumbnail: p.src.medium,
                photographer: p.photographer,
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "pexels"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_mapping() {
        let raw = r#"{"photos":[{"src":{"large2x":"https://img/2x.jpg","medium":"https://img/m.jpg"},"photographer":"Ana"}]}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.photos.len(), 1);
        assert_eq!(parsed.photos[0].src.large2x, "https://img/2x.jpg");
    }

    #[test]
    fn missing_photos_field_is_empty() {
        let parsed: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.photos.is_empty());
    }
}
