//! Pipeline stages for script-to-deck generation.
//!
//! Each submodule implements exactly one transformation step. Keeping stages
//! separate makes each independently testable and keeps the fallback policy
//! local to the stage that owns it.
//!
//! ## Data Flow
//!
//! ```text
//! script ──▶ splitter ──▶ style ──▶ images ──▶ infographic
//! (text)     (scenes)    (presets) (photos)   (visual+captions)
//! ```
//!
//! 1. [`splitter`] — cut the script into sentences, group them into scenes
//!    via batched LLM calls; raw-sentence fallback per batch
//! 2. [`style`] — assign a preset, emphasis and layout parameters per slide;
//!    default-decision fallback per chunk
//! 3. [`images`] — resolve stock photos for slides that want one, with
//!    provider circuit-breaking and an in-run keyword cache
//! 4. [`infographic`] — pick a visual and bundle cycling captions for
//!    infographic slides; emoji / single-caption fallbacks
//!
//! [`schema`] holds the validating parsers for every stage's LLM response;
//! parse failure is a first-class error that feeds the owning stage's
//! fallback.

pub mod images;
pub mod infographic;
pub mod schema;
pub mod splitter;
pub mod style;
