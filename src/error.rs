//! Error types for the script2deck library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`VslError`] — **Fatal**: generation or export cannot proceed at all
//!   (empty script, missing credential, user cancellation). Returned as
//!   `Err(VslError)` from the top-level entry points.
//!
//! * [`StageError`] — **Non-fatal**: one chunk or one slide failed inside a
//!   pipeline stage (LLM call error, malformed JSON, photo lookup miss).
//!   These are absorbed by the stage's fallback path and recorded in
//!   [`crate::generate::GenerationStats`]; the caller always receives a full
//!   slide set, degraded in styling rather than missing.
//!
//! The separation keeps the propagation policy in one place: nothing a single
//! LLM chunk does can abort the pipeline, while export failures surface with
//! their raw reason.

use thiserror::Error;

/// All fatal errors returned by the script2deck library.
///
/// Chunk- and slide-level failures use [`StageError`] and feed the stage
/// fallbacks rather than propagating here.
#[derive(Debug, Error)]
pub enum VslError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The script contained no non-empty lines after trimming.
    #[error("No content found in script.\nPaste at least one non-empty line.")]
    EmptyScript,

    /// A required API credential is absent.
    #[error("Missing credential for '{provider}'.\nSet {env_hint} or pass the key explicitly.")]
    MissingCredential { provider: String, env_hint: String },

    /// The caller cancelled the run via [`crate::generate::CancelToken`].
    ///
    /// Slides already produced before the cancel are kept; nothing is rolled
    /// back.
    #[error("Generation cancelled during the '{phase}' phase")]
    Cancelled { phase: String },

    // ── Store errors ──────────────────────────────────────────────────────
    /// No project with the given id.
    #[error("Project '{id}' not found")]
    ProjectNotFound { id: String },

    /// A store mutation referenced a slide that does not exist.
    #[error("Slide '{slide_id}' not found in project '{project_id}'")]
    SlideNotFound {
        project_id: String,
        slide_id: String,
    },

    /// Audio/export was requested before every slide passed review.
    #[error("{unreviewed} of {total} slides are not reviewed yet")]
    ReviewIncomplete { unreviewed: usize, total: usize },

    // ── Export errors ─────────────────────────────────────────────────────
    /// Rasterising a slide through the render service failed after retries.
    #[error("Failed to render slide {ordinal}: {detail}")]
    RenderFailed { ordinal: usize, detail: String },

    /// The remote video-composition job reported failure.
    #[error("Video job '{job_id}' failed: {detail}")]
    VideoJobFailed { job_id: String, detail: String },

    /// The remote video-composition job did not finish within the poll budget.
    #[error("Video job '{job_id}' still '{status}' after {attempts} polls")]
    VideoJobTimedOut {
        job_id: String,
        status: String,
        attempts: u32,
    },

    /// Writing the export archive failed.
    #[error("Failed to write export archive: {0}")]
    ArchiveFailed(String),

    /// An audio data-URL could not be decoded back to MP3 bytes.
    #[error("Slide {ordinal} carries an unreadable audio data-URL: {detail}")]
    BadAudioData { ordinal: usize, detail: String },

    // ── Upstream errors ───────────────────────────────────────────────────
    /// An upstream HTTP call failed after the retry budget was spent.
    #[error("HTTP error from '{service}': {detail}")]
    Http { service: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (illegal phase transition, poisoned lock).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error inside a pipeline stage.
///
/// Stages convert these into their documented fallback values; the error
/// itself is logged and counted, never returned to the caller.
#[derive(Debug, Clone, Error)]
pub enum StageError {
    /// An LLM call failed (transport, HTTP status, or empty response).
    #[error("{stage}: LLM call failed: {detail}")]
    LlmFailed { stage: &'static str, detail: String },

    /// The LLM answered, but the JSON did not match the stage schema.
    #[error("{stage}: response did not match schema: {detail}")]
    SchemaMismatch { stage: &'static str, detail: String },

    /// A stock-photo lookup produced no usable image.
    #[error("photo lookup for '{keyword}' failed: {detail}")]
    PhotoLookupFailed { keyword: String, detail: String },
}

impl StageError {
    /// True when the underlying failure looks like an exhausted-credits or
    /// billing problem. Logged distinctly so operators can tell quota
    /// exhaustion apart from flaky networking; the fallback path is the same.
    pub fn is_billing(&self) -> bool {
        let detail = match self {
            StageError::LlmFailed { detail, .. } => detail,
            StageError::SchemaMismatch { detail, .. } => detail,
            StageError::PhotoLookupFailed { detail, .. } => detail,
        };
        let lower = detail.to_lowercase();
        lower.contains("billing") || lower.contains("credit") || lower.contains("402")
    }
}
