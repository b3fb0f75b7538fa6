//! Pixabay search client (secondary provider).

use super::{Photo, PhotoError, StockPhotoProvider};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const SEARCH_API: &str = "https://pixabay.com/api/";

#[derive(Debug, Clone)]
pub struct PixabayClient {
    api_key: String,
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<PixabayHit>,
}

#[derive(Debug, Deserialize)]
struct PixabayHit {
    #[serde(rename = "largeImageURL")]
    large_image_url: Option<String>,
    #[serde(rename = "webformatURL")]
    webformat_url: Option<String>,
    #[serde(rename = "previewURL")]
    preview_url: Option<String>,
    user: Option<String>,
}

impl PixabayClient {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Result<Self, PhotoError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(PhotoError::NotConfigured {
                provider: "pixabay",
            });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PhotoError::Transport {
                provider: "pixabay",
                detail: e.to_string(),
            })?;
        Ok(Self {
            api_key,
            client,
            endpoint: SEARCH_API.to_string(),
        })
    }

    pub fn from_env(timeout_secs: u64) -> Result<Self, PhotoError> {
        let key = std::env::var("PIXABAY_API_KEY").map_err(|_| PhotoError::NotConfigured {
            provider: "pixabay",
        })?;
        Self::new(key, timeout_secs)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl StockPhotoProvider for PixabayClient {
    async fn search(&self, query: &str, per_page: usize) -> Result<Vec<Photo>, PhotoError> {
        // Pixabay rejects per_page below 3.
        let per_page = per_page.max(3);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", query),
                ("image_type", "photo"),
                ("orientation", "horizontal"),
                ("per_page", &per_page.to_string()),
                ("safesearch", "true"),
            ])
            .send()
            .await
            .map_err(|e| PhotoError::Transport {
                provider: "pixabay",
                detail: e.to_string(),
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(PhotoError::RateLimited {
                provider: "pixabay",
            });
        }
        if !status.is_success() {
            return Err(PhotoError::Api {
                provider: "pixabay",
                status: status.as_u16(),
            });
        }

        let parsed: SearchResponse =
            response.json().await.map_err(|e| PhotoError::Transport {
                provider: "pixabay",
                detail: e.to_string(),
            })?;

        Ok(parsed
            .hits
            .into_iter()
            .filter_map(|hit| {
                let url = hit.large_image_url.or(hit.webformat_url)?;
                Some(Photo {
                    url,
                    thumbnail: hit.preview_url,
                    photographer: hit.user,
                })
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "pixabay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_mapping_prefers_large_image() {
        let raw = r#"{"hits":[{"largeImageURL":"https://px/large.jpg","webformatURL":"https://px/web.jpg","previewURL":"https://px/prev.jpg","user":"bo"}]}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        let hit = &parsed.hits[0];
        assert_eq!(hit.large_image_url.as_deref(), Some("https://px/large.jpg"));
        assert_eq!(hit.webformat_url.as_deref(), Some("https://px/web.jpg"));
    }

    #[test]
    fn hit_without_urls_is_dropped() {
        let raw = r#"{"hits":[{"user":"bo"}]}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        let usable: Vec<_> = parsed
            .hits
            .into_iter()
            .filter_map(|h| h.large_image_url.or(h.webformat_url))
            .collect();
        assert!(usable.is_empty());
    }
}
