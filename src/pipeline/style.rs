//! Stage 2: decide a visual treatment for every slide.
//!
//! Slides go to the LLM in chunks; each chunk's prompt carries the design
//! policy, the tail of decisions already made (for variety across chunk
//! boundaries) and the caller's free-text art direction. Chunks inside one
//! wave run concurrently; waves run in order so later chunks can see earlier
//! decisions.
//!
//! A chunk that fails — call error or schema mismatch — degrades to the
//! documented default for every slide in it: white background, black text,
//! no emphasis. Styling quality drops, the deck stays complete.

use crate::config::GenerationConfig;
use crate::error::StageError;
use crate::generate::Phase;
use crate::llm::{ChatRequest, LanguageModel};
use crate::model::{
    BackgroundImage, BackgroundKind, DisplayMode, HeadshotSettings, Preset, Slide, TextColor,
};
use crate::pipeline::schema::{self, StyleDecision};
use crate::prompts::{self, StyleSlideLine};
use futures::future;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Gradient used by the `infographic` preset.
const INFOGRAPHIC_GRADIENT: &str = "linear-gradient(135deg, #667eea 0%, #764ba2 100%)";

/// Result of the style stage.
#[derive(Debug, Clone, Default)]
pub struct StyleOutcome {
    /// Chunks that took the fallback path.
    pub fallback_chunks: usize,
    /// Per-slide absorb counts the director asked for (> 0 only).
    pub absorb_counts: HashMap<String, usize>,
}

/// Run the style stage, mutating `slides` in place.
pub async fn run(
    llm: &Arc<dyn LanguageModel>,
    config: &GenerationConfig,
    slides: &mut [Slide],
) -> StyleOutcome {
    let total_slides = slides.len();
    let chunk_indices: Vec<(usize, std::ops::Range<usize>)> = slides
        .chunks(config.style_chunk)
        .enumerate()
        .map(|(i, c)| {
            let start = i * config.style_chunk;
            (i, start..start + c.len())
        })
        .collect();
    let total_chunks = chunk_indices.len();
    debug!("Styling {total_slides} slides in {total_chunks} chunks");

    let mut outcome = StyleOutcome::default();
    let mut decided: Vec<StyleDecision> = Vec::with_capacity(total_slides);

    // Waves: `style_concurrency` chunks in flight at once; the next wave sees
    // every decision made so far.
    for wave in chunk_indices.chunks(config.style_concurrency) {
        let previous = decided
            .iter()
            .rev()
            .take(10)
            .rev()
            .map(|d| format!("{}: {}", d.slide_id, d.preset.as_str()))
            .collect::<Vec<_>>()
            .join(", ");

        let futures = wave.iter().map(|(chunk_index, range)| {
            let llm = Arc::clone(llm);
            let config = config.clone();
            let chunk = &slides[range.clone()];
            let previous = previous.clone();
            async move {
                let result =
                    process_chunk(&llm, &config, chunk, *chunk_index, total_slides, &previous)
                        .await;
                if let Some(ref cb) = config.progress_callback {
                    cb.on_batch(
                        Phase::Styling,
                        chunk_index + 1,
                        total_chunks,
                        result.is_err(),
                    );
                }
                (range.clone(), result)
            }
        });

        for (range, result) in future::join_all(futures).await {
            match result {
                Ok(decisions) => decided.extend(decisions),
                Err(stage_err) => {
                    warn!("Style chunk failed, applying defaults: {stage_err}");
                    outcome.fallback_chunks += 1;
                    decided.extend(
                        slides[range]
                            .iter()
                            .map(|s| StyleDecision::fallback(s.id.as_str())),
                    );
                }
            }
        }
    }

    // Apply by id: the model occasionally reorders or drops entries, and a
    // slide without a decision keeps its unstyled defaults.
    let by_id: HashMap<&str, &StyleDecision> =
        decided.iter().map(|d| (d.slide_id.as_str(), d)).collect();
    for slide in slides.iter_mut() {
        if let Some(decision) = by_id.get(slide.id.as_str()) {
            apply_decision(slide, decision);
            let absorb = decision.absorb_count_clamped();
            if decision.is_infographic && absorb > 0 {
                outcome.absorb_counts.insert(slide.id.clone(), absorb);
            }
        }
    }

    outcome
}

async fn process_chunk(
    llm: &Arc<dyn LanguageModel>,
    config: &GenerationConfig,
    chunk: &[Slide],
    chunk_index: usize,
    total_slides: usize,
    previous: &str,
) -> Result<Vec<StyleDecision>, StageError> {
    let lines: Vec<StyleSlideLine<'_>> = chunk
        .iter()
        .map(|s| StyleSlideLine {
            id: &s.id,
            text: &s.full_script_text,
            scene_title: s.scene_title.as_deref(),
            emotion: s.emotion.as_deref(),
            has_image: s.image_keyword.is_some(),
        })
        .collect();

    let request = ChatRequest {
        model: config.style_model.clone(),
        max_tokens: config.max_tokens,
        temperature: Some(config.temperature),
        prompt: prompts::style_prompt(
            &lines,
            chunk_index,
            config.style_chunk,
            total_slides,
            previous,
            config.style_directive.as_deref(),
        ),
    };

    let raw = llm.complete(&request).await.map_err(|e| StageError::LlmFailed {
        stage: "style-director",
        detail: e.to_string(),
    })?;

    schema::parse_style_decisions(&raw)
}

/// Apply one decision to its slide: emphasis lists, then the deterministic
/// preset → style mapping.
pub fn apply_decision(slide: &mut Slide, decision: &StyleDecision) {
    slide.bold_words = decision.bold_words.clone();
    slide.underline_words = decision.underline_words.clone();
    slide.circle_words = decision.circle_words.clone();
    slide.red_words = decision.red_words.clone();

    slide.underline_styles = decision
        .underline_words
        .iter()
        .map(|w| (w.clone(), Default::default()))
        .collect();
    slide.circle_styles = decision
        .circle_words
        .iter()
        .map(|w| (w.clone(), Default::default()))
        .collect();

    match decision.preset {
        Preset::BlackBackground => {
            slide.style.background = BackgroundKind::Dark;
            slide.style.text_color = TextColor::White;
        }
        Preset::WhiteBackground => {
            slide.style.background = BackgroundKind::White;
            slide.style.text_color = TextColor::Black;
        }
        Preset::HeadshotBio => {
            slide.style.background = BackgroundKind::White;
            slide.style.text_color = TextColor::Black;
            // Empty headshot; the user uploads the picture later.
            slide.headshot = Some(HeadshotSettings::default());
        }
        Preset::ImageBackdrop => {
            slide.style.background = BackgroundKind::Image;
            slide.style.text_color = match decision.text_color {
                TextColor::Black => TextColor::Black,
                _ => TextColor::White,
            };
            slide.has_background_image = true;
            slide.background_image = Some(BackgroundImage {
                url: String::new(),
                opacity: decision.crispness_clamped(),
                blur: 8,
                // Split is not a backdrop mode; anything but Crisp reads as
                // Blurred. None is left for the resolver's parity rule.
                display_mode: match decision.display_mode {
                    Some(DisplayMode::Crisp) => Some(DisplayMode::Crisp),
                    Some(_) => Some(DisplayMode::Blurred),
                    None => None,
                },
                image_position_y: None,
            });
        }
        Preset::ImageText => {
            slide.style.background = BackgroundKind::Split;
            slide.style.text_color = TextColor::Black;
            slide.style.split_ratio = Some(50);
            slide.has_background_image = true;
            slide.background_image = Some(BackgroundImage {
                url: String::new(),
                opacity: 100,
                blur: 0,
                display_mode: Some(DisplayMode::Split),
                image_position_y: Some(35),
            });
        }
        Preset::Infographic => {
            slide.style.background = BackgroundKind::Gradient;
            slide.style.text_color = TextColor::White;
            slide.style.gradient = Some(INFOGRAPHIC_GRADIENT.to_string());
            slide.style.gradient_name = Some("purple".to_string());
            slide.is_infographic = true;
        }
    }

    if decision.is_headshot && decision.preset != Preset::HeadshotBio {
        slide.headshot = Some(HeadshotSettings::default());
    }
    if decision.is_infographic {
        slide.is_infographic = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CircleStyle, UnderlineStyle};

    fn slide() -> Slide {
        Slide::from_text("The breakthrough nobody saw", None, None, None, Some("lab".into()))
    }

    #[test]
    fn image_backdrop_installs_url_less_skeleton() {
        let mut s = slide();
        let raw = r#"[{"slideId":"X","preset":"image-backdrop","displayMode":"blurred","crispness":30,"textColor":"white"}]"#;
        let mut d = schema::parse_style_decisions(raw).unwrap().remove(0);
        d.slide_id = s.id.clone();
        apply_decision(&mut s, &d);

        assert!(s.has_background_image);
        let bg = s.background_image.as_ref().unwrap();
        assert!(bg.url.is_empty());
        assert_eq!(bg.opacity, 30);
        assert_eq!(bg.blur, 8);
        assert_eq!(bg.display_mode, Some(DisplayMode::Blurred));
        assert_eq!(s.style.background, BackgroundKind::Image);
        assert_eq!(s.style.text_color, TextColor::White);
    }

    #[test]
    fn image_text_is_fully_explicit_split() {
        let mut s = slide();
        let mut d = StyleDecision::fallback(s.id.as_str());
        d.preset = Preset::ImageText;
        apply_decision(&mut s, &d);

        let bg = s.background_image.as_ref().unwrap();
        assert_eq!(bg.display_mode, Some(DisplayMode::Split));
        assert_eq!(bg.opacity, 100);
        assert_eq!(bg.image_position_y, Some(35));
        assert_eq!(s.style.split_ratio, Some(50));
    }

    #[test]
    fn infographic_preset_sets_gradient_and_flag() {
        let mut s = slide();
        let mut d = StyleDecision::fallback(s.id.as_str());
        d.preset = Preset::Infographic;
        apply_decision(&mut s, &d);

        assert!(s.is_infographic);
        assert_eq!(s.style.background, BackgroundKind::Gradient);
        assert_eq!(s.style.gradient_name.as_deref(), Some("purple"));
        assert!(!s.has_background_image);
    }

    #[test]
    fn emphasis_words_get_default_variants() {
        let mut s = slide();
        let mut d = StyleDecision::fallback(s.id.as_str());
        d.underline_words = vec!["breakthrough".into()];
        d.circle_words = vec!["nobody".into()];
        apply_decision(&mut s, &d);

        assert_eq!(
            s.underline_styles.get("breakthrough"),
            Some(&UnderlineStyle::BrushRed)
        );
        assert_eq!(s.circle_styles.get("nobody"), Some(&CircleStyle::RedSolid));
    }

    #[test]
    fn headshot_flag_without_preset_still_adds_headshot() {
        let mut s = slide();
        let mut d = StyleDecision::fallback(s.id.as_str());
        d.preset = Preset::BlackBackground;
        d.is_headshot = true;
        apply_decision(&mut s, &d);
        assert!(s.headshot.is_some());
        assert_eq!(s.style.background, BackgroundKind::Dark);
    }

    #[test]
    fn backdrop_without_display_mode_leaves_layout_to_resolver() {
        let mut s = slide();
        let mut d = StyleDecision::fallback(s.id.as_str());
        d.preset = Preset::ImageBackdrop;
        apply_decision(&mut s, &d);
        assert_eq!(
            s.background_image.as_ref().unwrap().display_mode,
            None
        );
    }
}
