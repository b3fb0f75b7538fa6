//! Stock-photo providers.
//!
//! The Image Resolver talks through [`StockPhotoProvider`] so the pipeline can
//! switch between the primary (Pexels) and secondary (Pixabay) clients — and
//! tests can script rate limits — without touching the resolver logic. The
//! per-provider [`breaker::CircuitBreaker`] decides when a provider is
//! considered down for the rest of a run.

pub mod breaker;
mod pexels;
mod pixabay;

pub use pexels::PexelsClient;
pub use pixabay::PixabayClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One stock photo, mapped to a common shape across providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photographer: Option<String>,
}

/// Errors from a photo search.
#[derive(Debug, Clone, Error)]
pub enum PhotoError {
    /// HTTP 429 — the caller should stop using this provider for a while.
    #[error("'{provider}' rate limited the request")]
    RateLimited { provider: &'static str },

    /// Any other non-success status.
    #[error("'{provider}' returned HTTP {status}")]
    Api { provider: &'static str, status: u16 },

    /// The request never completed.
    #[error("'{provider}' transport error: {detail}")]
    Transport {
        provider: &'static str,
        detail: String,
    },

    /// Missing API key.
    #[error("'{provider}' is not configured (missing API key)")]
    NotConfigured { provider: &'static str },
}

impl PhotoError {
    /// The HTTP status to feed the breaker policy table, if one applies.
    pub fn status(&self) -> Option<u16> {
        match self {
            PhotoError::RateLimited { .. } => Some(429),
            PhotoError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A keyword-search photo backend.
#[async_trait]
pub trait StockPhotoProvider: Send + Sync {
    /// Search landscape photos for `query`, newest-relevance first.
    ///
    /// An empty vector is a valid answer (no hits); errors are reserved for
    /// transport/HTTP failures.
    async fn search(&self, query: &str, per_page: usize) -> Result<Vec<Photo>, PhotoError>;

    /// Short provider name for logs and the breaker registry.
    fn name(&self) -> &'static str;
}
