//! # script2deck
//!
//! Turn a VSL (video sales letter) script into a styled slide deck using LLM
//! orchestration.
//!
//! ## Why this crate?
//!
//! Hand-building a sales deck from a script is slide-by-slide drudgery:
//! splitting lines into beats, picking a layout per slide, hunting stock
//! photos, wiring infographic moments. This crate drives that whole pipeline
//! through a handful of structured LLM calls and two stock-photo APIs — and
//! every call that can fail has a deterministic fallback, so a run always
//! ends with a complete deck, degraded in styling rather than missing
//! slides.
//!
//! ## Pipeline Overview
//!
//! ```text
//! script
//!  │
//!  ├─ 1. Split    sentences → scenes/slides (batched LLM calls, fan-out 3)
//!  ├─ 2. Style    preset + emphasis + layout per slide (chunked, fan-out 5)
//!  ├─ 3. Images   stock-photo lookup, circuit-broken provider fallback
//!  ├─ 4. Enrich   infographic visuals + cycling caption bundles
//!  └─ 5. Export   1920×1080 PNGs → ZIP, or remote-composed MP4
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use script2deck::{
//!     AnthropicModel, CancelToken, GenerationConfig, PexelsClient, Pipeline, PixabayClient,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GenerationConfig::default();
//!     let pipeline = Pipeline::new(
//!         Arc::new(AnthropicModel::from_env(60)?),
//!         Arc::new(PexelsClient::from_env(30)?),
//!         Arc::new(PixabayClient::from_env(30)?),
//!         config,
//!     );
//!
//!     let script = std::fs::read_to_string("script.txt")?;
//!     let output = pipeline.generate(&script, &CancelToken::new()).await?;
//!     println!(
//!         "{} slides, {} with images",
//!         output.stats.total_slides, output.stats.image_slides
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `script2deck` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! script2deck = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod generate;
pub mod imagegen;
pub mod llm;
pub mod model;
pub mod photos;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod store;
pub mod tts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GenerationConfig, GenerationConfigBuilder, RetryPolicy};
pub use error::{StageError, VslError};
pub use export::{RemoteRenderer, SlideRenderer, VideoComposer, VideoScene};
pub use generate::{CancelToken, GenerationOutput, GenerationStats, Phase, Pipeline};
pub use imagegen::{GeneratedImage, ImageGenClient, ImageProvider};
pub use llm::{AnthropicModel, ChatRequest, FallbackModel, LanguageModel, LlmError, OpenAiModel};
pub use model::{
    BackgroundImage, BackgroundKind, DisplayMode, Preset, Project, Scene, Slide, SlideStyle,
    TextColor,
};
pub use photos::{PexelsClient, Photo, PhotoError, PixabayClient, StockPhotoProvider};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{Mutation, MutationResult, ProjectStore};
pub use tts::{ElevenLabsClient, SubscriptionInfo, Voice};
