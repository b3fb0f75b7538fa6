//! Progress-callback trait for generation events.
//!
//! Inject an `Arc<dyn GenerationProgressCallback>` via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its phases. The callback approach is
//! the least-invasive integration point: callers can forward events to a
//! channel, a WebSocket, or a terminal progress bar without the library
//! knowing how the host application communicates.

use crate::generate::Phase;
use std::sync::Arc;

/// Called by the generation pipeline as it progresses.
///
/// Implementations must be `Send + Sync`: batch events fire concurrently from
/// the fan-out futures. All methods have default no-op implementations so
/// callers only override what they care about.
pub trait GenerationProgressCallback: Send + Sync {
    /// Fired on every phase transition, including the final `Done`/`Error`.
    fn on_phase(&self, phase: Phase) {
        let _ = phase;
    }

    /// Fired when one split/style batch finishes (successfully or via its
    /// fallback).
    ///
    /// * `completed` / `total` — batch counts within the current phase
    /// * `fallback` — true when the batch took the fallback path
    fn on_batch(&self, phase: Phase, completed: usize, total: usize, fallback: bool) {
        let _ = (phase, completed, total, fallback);
    }

    /// Fired when the Image Resolver settles one slide (with or without an
    /// image).
    fn on_slide_resolved(&self, completed: usize, total: usize, resolved: bool) {
        let _ = (completed, total, resolved);
    }

    /// Fired once after the pipeline completes.
    fn on_complete(&self, total_slides: usize, image_slides: usize) {
        let _ = (total_slides, image_slides);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in
/// [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;
