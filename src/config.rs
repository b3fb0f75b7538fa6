//! Configuration for a slide-generation run.
//!
//! All pipeline behaviour is controlled through [`GenerationConfig`], built
//! via its [`GenerationConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across stages, log them, and diff two runs to
//! understand why their outputs differ.

use crate::error::VslError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for a generation run.
///
/// Built via [`GenerationConfig::builder()`] or [`GenerationConfig::default()`].
///
/// # Example
/// ```rust
/// use script2deck::GenerationConfig;
///
/// let config = GenerationConfig::builder()
///     .style_directive("dark, cinematic, lots of red accents")
///     .split_concurrency(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Sentences per split-stage LLM batch. Default: 40.
    ///
    /// Batches larger than ~40 lines push the scene response past the
    /// completion budget and the model starts dropping lines; smaller batches
    /// waste calls on short scripts.
    pub sentence_batch: usize,

    /// Concurrent split-stage LLM calls. Default: 3.
    pub split_concurrency: usize,

    /// Slides per style-stage LLM chunk. Default: 20.
    pub style_chunk: usize,

    /// Concurrent style-stage LLM calls. Default: 5.
    pub style_concurrency: usize,

    /// Free-text art direction appended to the style prompt. Default: none.
    pub style_directive: Option<String>,

    /// Model id for the split / keyword / infographic stages.
    /// Default: "claude-3-5-haiku-20241022".
    ///
    /// These stages are volume work: many small structured-JSON calls where a
    /// haiku-class model is indistinguishable from a frontier one.
    pub fast_model: String,

    /// Model id for the style stage. Default: "claude-sonnet-4-20250514".
    ///
    /// Styling is the one prompt where taste shows; it gets the larger model.
    pub style_model: String,

    /// Max tokens per LLM completion. Default: 4096.
    pub max_tokens: usize,

    /// Sampling temperature. Default: 0.7.
    pub temperature: f32,

    /// Pacing delay between sequential primary-provider photo lookups, in
    /// milliseconds. Default: 250.
    ///
    /// The primary stock-photo API rate-limits aggressively; a small gap
    /// between calls keeps a 100-slide run under its per-minute window.
    pub primary_lookup_delay_ms: u64,

    /// Pacing delay for the secondary provider. Default: 100.
    pub secondary_lookup_delay_ms: u64,

    /// Seconds an open photo-provider breaker waits before allowing one
    /// half-open trial call. Default: 60.
    pub breaker_cooldown_secs: u64,

    /// Max contiguous slides one infographic may absorb. Default: 5, min 2.
    pub max_caption_lines: usize,

    /// Per-LLM-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Progress callback fired on phase changes and per-batch completion.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            sentence_batch: 40,
            split_concurrency: 3,
            style_chunk: 20,
            style_concurrency: 5,
            style_directive: None,
            fast_model: "claude-3-5-haiku-20241022".to_string(),
            style_model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            primary_lookup_delay_ms: 250,
            secondary_lookup_delay_ms: 100,
            breaker_cooldown_secs: 60,
            max_caption_lines: 5,
            api_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("sentence_batch", &self.sentence_batch)
            .field("split_concurrency", &self.split_concurrency)
            .field("style_chunk", &self.style_chunk)
            .field("style_concurrency", &self.style_concurrency)
            .field("style_directive", &self.style_directive)
            .field("fast_model", &self.fast_model)
            .field("style_model", &self.style_model)
            .field("max_tokens", &self.max_tokens)
            .field("max_caption_lines", &self.max_caption_lines)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn sentence_batch(mut self, n: usize) -> Self {
        self.config.sentence_batch = n.max(1);
        self
    }

    pub fn split_concurrency(mut self, n: usize) -> Self {
        self.config.split_concurrency = n.max(1);
        self
    }

    pub fn style_chunk(mut self, n: usize) -> Self {
        self.config.style_chunk = n.max(1);
        self
    }

    pub fn style_concurrency(mut self, n: usize) -> Self {
        self.config.style_concurrency = n.max(1);
        self
    }

    pub fn style_directive(mut self, directive: impl Into<String>) -> Self {
        self.config.style_directive = Some(directive.into());
        self
    }

    pub fn fast_model(mut self, model: impl Into<String>) -> Self {
        self.config.fast_model = model.into();
        self
    }

    pub fn style_model(mut self, model: impl Into<String>) -> Self {
        self.config.style_model = model.into();
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn primary_lookup_delay_ms(mut self, ms: u64) -> Self {
        self.config.primary_lookup_delay_ms = ms;
        self
    }

    pub fn secondary_lookup_delay_ms(mut self, ms: u64) -> Self {
        self.config.secondary_lookup_delay_ms = ms;
        self
    }

    pub fn breaker_cooldown_secs(mut self, secs: u64) -> Self {
        self.config.breaker_cooldown_secs = secs;
        self
    }

    pub fn max_caption_lines(mut self, n: usize) -> Self {
        self.config.max_caption_lines = n.max(2);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, VslError> {
        let c = &self.config;
        if c.sentence_batch == 0 || c.style_chunk == 0 {
            return Err(VslError::InvalidConfig(
                "Batch and chunk sizes must be ≥ 1".into(),
            ));
        }
        if c.max_caption_lines < 2 {
            return Err(VslError::InvalidConfig(format!(
                "max_caption_lines must be ≥ 2, got {}",
                c.max_caption_lines
            )));
        }
        Ok(self.config)
    }
}

/// Retry policy for export-time HTTP calls.
///
/// Kept separate from [`GenerationConfig`] because generation stages never
/// retry — their failure path is the per-chunk fallback, not backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts after the first call. Default: 3.
    pub max_retries: u32,
    /// Initial delay in milliseconds, doubling each attempt. Default: 1000.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `attempt` (1-indexed): `base * 2^(attempt-1)`.
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        self.base_delay_ms * 2u64.pow(attempt.saturating_sub(1))
    }
}
