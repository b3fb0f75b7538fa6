//! Top-level orchestration: script in, styled slide deck out.
//!
//! [`Pipeline::generate`] drives the four stages in dependency order —
//! splitting → styling → resolving-images → enriching — behind an explicit
//! phase state machine. Stage failures never surface here (each stage owns
//! its fallbacks); the only fatal outcomes are an empty script and a caller
//! cancel.
//!
//! Cancellation is best-effort: the [`CancelToken`] is checked between
//! stages and between the slide-level steps inside the image and enrichment
//! stages. A cancel stops new work from being issued; it does not roll back
//! slides already produced.

use crate::config::GenerationConfig;
use crate::error::VslError;
use crate::llm::LanguageModel;
use crate::photos::StockPhotoProvider;
use crate::pipeline::{images, infographic, splitter, style};
use crate::model::Slide;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

// ── Phase state machine ──────────────────────────────────────────────────

/// Named pipeline phases.
///
/// Replaces ad hoc in-flight flags with one authoritative state; transitions
/// outside [`Phase::can_advance_to`] are programming errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Idle,
    Splitting,
    Styling,
    ResolvingImages,
    Enriching,
    Done,
    Error,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Splitting => "splitting",
            Phase::Styling => "styling",
            Phase::ResolvingImages => "resolving-images",
            Phase::Enriching => "enriching",
            Phase::Done => "done",
            Phase::Error => "error",
        }
    }

    /// Legal transitions: the happy path in stage order, plus `Error` from
    /// any non-terminal phase. `Done` and `Error` are terminal.
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (Idle, Splitting)
            | (Splitting, Styling)
            | (Styling, ResolvingImages)
            | (ResolvingImages, Enriching)
            | (Enriching, Done) => true,
            (Done | Error, _) => false,
            (_, Error) => true,
            _ => false,
        }
    }
}

/// The phase machine the orchestrator drives.
pub struct PhaseMachine {
    current: Phase,
    callback: Option<crate::progress::ProgressCallback>,
}

impl std::fmt::Debug for PhaseMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseMachine")
            .field("current", &self.current)
            .field("callback", &self.callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl PhaseMachine {
    pub fn new(callback: Option<crate::progress::ProgressCallback>) -> Self {
        Self {
            current: Phase::Idle,
            callback,
        }
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    /// Advance to `next`, firing the progress callback.
    pub fn advance(&mut self, next: Phase) -> Result<(), VslError> {
        if !self.current.can_advance_to(next) {
            return Err(VslError::Internal(format!(
                "illegal phase transition {} → {}",
                self.current.as_str(),
                next.as_str()
            )));
        }
        self.current = next;
        if let Some(ref cb) = self.callback {
            cb.on_phase(next);
        }
        Ok(())
    }
}

// ── Cancellation ─────────────────────────────────────────────────────────

/// Shared cancel flag threaded through the pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Output ───────────────────────────────────────────────────────────────

/// Statistics for one generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStats {
    pub total_slides: usize,
    /// Slides that ended up with a resolved background image.
    pub image_slides: usize,
    pub infographic_slides: usize,
    /// Split batches that fell back to raw sentences.
    pub fallback_batches: usize,
    /// Style chunks that fell back to the default decision.
    pub fallback_chunks: usize,
    pub split_ms: u64,
    pub style_ms: u64,
    pub images_ms: u64,
    pub enrich_ms: u64,
    pub total_ms: u64,
}

/// Result of [`Pipeline::generate`].
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub slides: Vec<Slide>,
    pub stats: GenerationStats,
}

// ── Pipeline ─────────────────────────────────────────────────────────────

/// The wired-up generation pipeline.
pub struct Pipeline {
    llm: Arc<dyn LanguageModel>,
    photo_primary: Arc<dyn StockPhotoProvider>,
    photo_secondary: Arc<dyn StockPhotoProvider>,
    config: GenerationConfig,
}

impl Pipeline {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        photo_primary: Arc<dyn StockPhotoProvider>,
        photo_secondary: Arc<dyn StockPhotoProvider>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            llm,
            photo_primary,
            photo_secondary,
            config,
        }
    }

    /// Turn a raw script into a styled slide deck.
    ///
    /// # Errors
    /// * [`VslError::EmptyScript`] when the script has no non-empty lines
    /// * [`VslError::Cancelled`] when `cancel` fires between stages
    pub async fn generate(
        &self,
        script: &str,
        cancel: &CancelToken,
    ) -> Result<GenerationOutput, VslError> {
        let total_start = Instant::now();
        let mut machine = PhaseMachine::new(self.config.progress_callback.clone());
        let mut stats = GenerationStats::default();

        let sentences = splitter::split_sentences(script);
        if sentences.is_empty() {
            machine.advance(Phase::Error)?;
            return Err(VslError::EmptyScript);
        }
        info!("Generating deck from {} script lines", sentences.len());

        // ── Stage 1: split ───────────────────────────────────────────────
        machine.advance(Phase::Splitting)?;
        self.check_cancel(&mut machine, cancel)?;
        let stage_start = Instant::now();
        let split = splitter::run(&self.llm, &self.config, &sentences).await;
        stats.fallback_batches = split.fallback_batches;
        stats.split_ms = stage_start.elapsed().as_millis() as u64;
        info!(
            "Split produced {} slides in {} scenes ({} fallback batches)",
            split.total_slides,
            split.scenes.len(),
            split.fallback_batches
        );

        let mut slides = splitter::flatten_scenes(split.scenes);

        // ── Stage 2: style ───────────────────────────────────────────────
        machine.advance(Phase::Styling)?;
        self.check_cancel(&mut machine, cancel)?;
        let stage_start = Instant::now();
        let style_outcome = style::run(&self.llm, &self.config, &mut slides).await;
        stats.fallback_chunks = style_outcome.fallback_chunks;
        stats.style_ms = stage_start.elapsed().as_millis() as u64;

        // ── Stage 3: images ──────────────────────────────────────────────
        machine.advance(Phase::ResolvingImages)?;
        self.check_cancel(&mut machine, cancel)?;
        let stage_start = Instant::now();
        let image_outcome = images::run(
            Arc::clone(&self.photo_primary),
            Arc::clone(&self.photo_secondary),
            &self.config,
            cancel,
            &mut slides,
        )
        .await;
        stats.images_ms = stage_start.elapsed().as_millis() as u64;
        info!(
            "Resolved {}/{} background images",
            image_outcome.resolved, image_outcome.attempted
        );

        // ── Stage 4: enrich ──────────────────────────────────────────────
        machine.advance(Phase::Enriching)?;
        self.check_cancel(&mut machine, cancel)?;
        let stage_start = Instant::now();
        infographic::run(
            &self.llm,
            &self.config,
            cancel,
            &mut slides,
            &style_outcome.absorb_counts,
        )
        .await;
        stats.enrich_ms = stage_start.elapsed().as_millis() as u64;

        // Cancellation inside the last two stages stops early without an
        // error; cancellation observed here still reports Cancelled.
        self.check_cancel(&mut machine, cancel)?;

        machine.advance(Phase::Done)?;

        stats.total_slides = slides.len();
        stats.image_slides = slides
            .iter()
            .filter(|s| {
                s.background_image
                    .as_ref()
                    .map(|bg| !bg.url.is_empty())
                    .unwrap_or(false)
            })
            .count();
        stats.infographic_slides = slides.iter().filter(|s| s.is_infographic).count();
        stats.total_ms = total_start.elapsed().as_millis() as u64;

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_complete(stats.total_slides, stats.image_slides);
        }
        info!(
            "Deck complete: {} slides, {} images, {} infographics, {}ms",
            stats.total_slides, stats.image_slides, stats.infographic_slides, stats.total_ms
        );

        Ok(GenerationOutput { slides, stats })
    }

    fn check_cancel(
        &self,
        machine: &mut PhaseMachine,
        cancel: &CancelToken,
    ) -> Result<(), VslError> {
        if cancel.is_cancelled() {
            let phase = machine.current();
            machine.advance(Phase::Error)?;
            return Err(VslError::Cancelled {
                phase: phase.as_str().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_legal() {
        let path = [
            Phase::Idle,
            Phase::Splitting,
            Phase::Styling,
            Phase::ResolvingImages,
            Phase::Enriching,
            Phase::Done,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_advance_to(pair[1]),
                "{:?} → {:?} should be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn skipping_stages_is_illegal() {
        assert!(!Phase::Idle.can_advance_to(Phase::Enriching));
        assert!(!Phase::Splitting.can_advance_to(Phase::ResolvingImages));
        assert!(!Phase::Styling.can_advance_to(Phase::Done));
    }

    #[test]
    fn error_is_reachable_from_active_phases_only() {
        assert!(Phase::Splitting.can_advance_to(Phase::Error));
        assert!(Phase::Idle.can_advance_to(Phase::Error));
        assert!(!Phase::Done.can_advance_to(Phase::Error));
        assert!(!Phase::Error.can_advance_to(Phase::Splitting));
    }

    #[test]
    fn machine_rejects_illegal_advance() {
        let mut m = PhaseMachine::new(None);
        assert!(m.advance(Phase::Styling).is_err());
        assert_eq!(m.current(), Phase::Idle);
        m.advance(Phase::Splitting).unwrap();
        assert_eq!(m.current(), Phase::Splitting);
    }

    #[test]
    fn cancel_token_is_shared() {
        let t = CancelToken::new();
        let clone = t.clone();
        assert!(!clone.is_cancelled());
        t.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn phase_wire_name_is_kebab_case() {
        let json = serde_json::to_string(&Phase::ResolvingImages).unwrap();
        assert_eq!(json, r#""resolving-images""#);
    }
}
