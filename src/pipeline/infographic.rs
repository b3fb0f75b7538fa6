//! Stage 4: give each infographic slide a visual and its cycling captions.
//!
//! Two independent LLM requests per infographic slide. The *visual* request
//! picks an emoji, a named icon, or a small self-contained SVG; icon names
//! are normalised to emoji through the fixed lookup table, unknown names and
//! failures both land on the generic fallback emoji. The *lines* request
//! looks at the slide plus up to the next ten and bundles the contiguous run
//! that forms one explanatory beat; its failure bundles just the slide
//! itself. The two fallbacks are independent — a dead visual call never
//! costs the slide its captions.
//!
//! Absorption is first-claim-wins: a slide already absorbed by an earlier
//! infographic slide is never claimed again, and a claimed infographic slide
//! is itself skipped (it is a caption now, not a holder).

use crate::config::GenerationConfig;
use crate::error::StageError;
use crate::generate::CancelToken;
use crate::llm::{ChatRequest, LanguageModel};
use crate::model::{InfographicVisual, Slide};
use crate::pipeline::schema::{self, VisualChoice};
use crate::prompts::{self, BundleSlideLine, FALLBACK_EMOJI, ICON_LIBRARY};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// How many following slides the lines request may look at.
const CONTEXT_WINDOW: usize = 10;

/// Result of the enrichment stage.
#[derive(Debug, Clone, Default)]
pub struct EnrichOutcome {
    /// Infographic slides that were enriched.
    pub enriched: usize,
    /// Visual requests that fell back to the generic emoji.
    pub visual_fallbacks: usize,
    /// Lines requests that fell back to a single-caption bundle.
    pub line_fallbacks: usize,
}

/// Run the enrichment stage, mutating `slides` in place.
///
/// `absorb_counts` carries the Style Director's per-slide absorb wishes;
/// a wish caps the bundle below [`GenerationConfig::max_caption_lines`].
pub async fn run(
    llm: &Arc<dyn LanguageModel>,
    config: &GenerationConfig,
    cancel: &CancelToken,
    slides: &mut [Slide],
    absorb_counts: &HashMap<String, usize>,
) -> EnrichOutcome {
    let targets: Vec<usize> = slides
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_infographic)
        .map(|(i, _)| i)
        .collect();
    debug!("{} infographic slides to enrich", targets.len());

    let mut outcome = EnrichOutcome::default();
    let mut claimed: HashSet<String> = HashSet::new();

    for index in targets {
        if cancel.is_cancelled() {
            break;
        }
        if claimed.contains(&slides[index].id) {
            debug!(
                "Skipping infographic slide {} — already absorbed upstream",
                slides[index].id
            );
            continue;
        }

        let visual = match fetch_visual(llm, config, &slides[index]).await {
            Ok(v) => v,
            Err(stage_err) => {
                warn!("Visual request failed, using fallback emoji: {stage_err}");
                outcome.visual_fallbacks += 1;
                InfographicVisual::Emoji(FALLBACK_EMOJI.to_string())
            }
        };

        let max_lines = bundle_cap(config, absorb_counts.get(&slides[index].id).copied());
        let bundle = match fetch_bundle(llm, config, slides, index, max_lines).await {
            Ok(b) => b,
            Err(stage_err) => {
                warn!("Lines request failed, bundling only the trigger slide: {stage_err}");
                outcome.line_fallbacks += 1;
                schema::LineBundle {
                    bundled_slide_ids: vec![slides[index].id.clone()],
                    captions: vec![slides[index].full_script_text.clone()],
                    reasoning: String::new(),
                }
            }
        };

        let (captions, absorbed) = reconcile_bundle(slides, index, bundle, max_lines, &claimed);
        claimed.extend(absorbed.iter().cloned());

        let slide = &mut slides[index];
        slide.infographic_visual = Some(visual);
        slide.infographic_captions = captions;
        slide.absorbed_slide_ids = absorbed;
        outcome.enriched += 1;
    }

    outcome
}

/// Bundle size limit: the director's absorb wish (next-slide count, so +1 for
/// the trigger) capped by the config, floored at 2.
fn bundle_cap(config: &GenerationConfig, absorb_wish: Option<usize>) -> usize {
    match absorb_wish {
        Some(next_slides) => (next_slides + 1).clamp(2, config.max_caption_lines),
        None => config.max_caption_lines.max(2),
    }
}

async fn fetch_visual(
    llm: &Arc<dyn LanguageModel>,
    config: &GenerationConfig,
    slide: &Slide,
) -> Result<InfographicVisual, StageError> {
    let context = slide
        .emotion
        .as_deref()
        .or(slide.scene_title.as_deref())
        .unwrap_or("general");
    let request = ChatRequest {
        model: config.fast_model.clone(),
        max_tokens: 2048,
        temperature: Some(config.temperature),
        prompt: prompts::visual_prompt(&slide.full_script_text, context),
    };

    let raw = llm.complete(&request).await.map_err(|e| StageError::LlmFailed {
        stage: "infographic-visual",
        detail: e.to_string(),
    })?;

    Ok(normalize_visual(schema::parse_visual(&raw)?))
}

/// Icon answers become emoji through the lookup table; unknown icons land on
/// the fallback. The result is only ever `Emoji` or `Svg`.
pub fn normalize_visual(choice: VisualChoice) -> InfographicVisual {
    match choice {
        VisualChoice::Emoji { value } => InfographicVisual::Emoji(value),
        VisualChoice::Svg { value } => InfographicVisual::Svg(value),
        VisualChoice::Icon { value } => {
            let emoji = ICON_LIBRARY
                .get(value.to_lowercase().as_str())
                .copied()
                .unwrap_or(FALLBACK_EMOJI);
            InfographicVisual::Emoji(emoji.to_string())
        }
    }
}

async fn fetch_bundle(
    llm: &Arc<dyn LanguageModel>,
    config: &GenerationConfig,
    slides: &[Slide],
    index: usize,
    max_lines: usize,
) -> Result<schema::LineBundle, StageError> {
    let window_end = (index + 1 + CONTEXT_WINDOW).min(slides.len());
    let lines: Vec<BundleSlideLine<'_>> = slides[index..window_end]
        .iter()
        .map(|s| BundleSlideLine {
            id: &s.id,
            text: &s.full_script_text,
            emotion: s.emotion.as_deref(),
        })
        .collect();

    let request = ChatRequest {
        model: config.fast_model.clone(),
        max_tokens: 1024,
        temperature: Some(config.temperature),
        prompt: prompts::lines_prompt(&lines, max_lines),
    };

    let raw = llm.complete(&request).await.map_err(|e| StageError::LlmFailed {
        stage: "infographic-lines",
        detail: e.to_string(),
    })?;

    schema::parse_line_bundle(&raw)
}

/// Validate the model's bundle against the deck.
///
/// * The trigger slide is force-included as the first entry.
/// * Only ids inside the context window survive; ids already claimed by an
///   earlier infographic slide are dropped, as is the trigger's own id in
///   the absorbed list.
/// * Captions align with ids; a missing caption falls back to the bundled
///   slide's own text.
///
/// Returns `(captions, absorbed_slide_ids)`.
fn reconcile_bundle(
    slides: &[Slide],
    index: usize,
    bundle: schema::LineBundle,
    max_lines: usize,
    claimed: &HashSet<String>,
) -> (Vec<String>, Vec<String>) {
    let trigger_id = slides[index].id.clone();
    let window_end = (index + 1 + CONTEXT_WINDOW).min(slides.len());
    let text_by_id: HashMap<&str, &str> = slides[index..window_end]
        .iter()
        .map(|s| (s.id.as_str(), s.full_script_text.as_str()))
        .collect();

    let mut ids: Vec<String> = Vec::new();
    let mut captions: Vec<String> = Vec::new();

    // Force-include the trigger first, with its model caption if it has one.
    let trigger_caption = bundle
        .bundled_slide_ids
        .iter()
        .position(|id| *id == trigger_id)
        .and_then(|pos| bundle.captions.get(pos).cloned())
        .unwrap_or_else(|| slides[index].full_script_text.clone());
    ids.push(trigger_id.clone());
    captions.push(trigger_caption);

    for (pos, id) in bundle.bundled_slide_ids.iter().enumerate() {
        if ids.len() >= max_lines {
            break;
        }
        if *id == trigger_id || ids.contains(id) || claimed.contains(id) {
            continue;
        }
        let Some(text) = text_by_id.get(id.as_str()) else {
            continue;
        };
        let caption = bundle
            .captions
            .get(pos)
            .cloned()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| (*text).to_string());
        ids.push(id.clone());
        captions.push(caption);
    }

    let absorbed = ids[1..].to_vec();
    (captions, absorbed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deck(texts: &[&str]) -> Vec<Slide> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let mut s = Slide::from_text(*t, None, None, None, None);
                s.ordinal = i;
                s.id = format!("s-{i}");
                s
            })
            .collect()
    }

    #[test]
    fn normalize_known_icon() {
        let v = normalize_visual(VisualChoice::Icon {
            value: "Rocket".into(),
        });
        assert_eq!(v, InfographicVisual::Emoji("🚀".to_string()));
    }

    #[test]
    fn normalize_unknown_icon_falls_back() {
        let v = normalize_visual(VisualChoice::Icon {
            value: "flux-capacitor".into(),
        });
        assert_eq!(v, InfographicVisual::Emoji(FALLBACK_EMOJI.to_string()));
    }

    #[test]
    fn normalize_keeps_svg() {
        let v = normalize_visual(VisualChoice::Svg {
            value: "<svg viewBox=\"0 0 100 100\"/>".into(),
        });
        assert!(matches!(v, InfographicVisual::Svg(_)));
    }

    #[test]
    fn reconcile_force_includes_trigger_first() {
        let slides = deck(&["zero", "one", "two"]);
        let bundle = schema::LineBundle {
            bundled_slide_ids: vec!["s-1".into(), "s-2".into()],
            captions: vec!["cap one".into(), "cap two".into()],
            reasoning: String::new(),
        };
        let (captions, absorbed) =
            reconcile_bundle(&slides, 0, bundle, 5, &HashSet::new());
        assert_eq!(captions[0], "zero");
        assert_eq!(captions.len(), 3);
        assert_eq!(absorbed, vec!["s-1", "s-2"]);
    }

    #[test]
    fn reconcile_never_absorbs_own_id() {
        let slides = deck(&["zero", "one"]);
        let bundle = schema::LineBundle {
            bundled_slide_ids: vec!["s-0".into(), "s-0".into(), "s-1".into()],
            captions: vec!["a".into(), "b".into(), "c".into()],
            reasoning: String::new(),
        };
        let (_, absorbed) = reconcile_bundle(&slides, 0, bundle, 5, &HashSet::new());
        assert_eq!(absorbed, vec!["s-1"]);
    }

    #[test]
    fn reconcile_skips_already_claimed() {
        let slides = deck(&["zero", "one", "two"]);
        let mut claimed = HashSet::new();
        claimed.insert("s-1".to_string());
        let bundle = schema::LineBundle {
            bundled_slide_ids: vec!["s-0".into(), "s-1".into(), "s-2".into()],
            captions: vec!["a".into(), "b".into(), "c".into()],
            reasoning: String::new(),
        };
        let (captions, absorbed) = reconcile_bundle(&slides, 0, bundle, 5, &claimed);
        assert_eq!(absorbed, vec!["s-2"]);
        assert_eq!(captions, vec!["a", "c"]);
    }

    #[test]
    fn reconcile_drops_ids_outside_window() {
        let slides = deck(&["zero", "one"]);
        let bundle = schema::LineBundle {
            bundled_slide_ids: vec!["s-0".into(), "ghost".into(), "s-1".into()],
            captions: vec!["a".into(), "b".into(), "c".into()],
            reasoning: String::new(),
        };
        let (_, absorbed) = reconcile_bundle(&slides, 0, bundle, 5, &HashSet::new());
        assert_eq!(absorbed, vec!["s-1"]);
    }

    #[test]
    fn reconcile_caps_bundle_size() {
        let slides = deck(&["a", "b", "c", "d", "e"]);
        let bundle = schema::LineBundle {
            bundled_slide_ids: (0..5).map(|i| format!("s-{i}")).collect(),
            captions: (0..5).map(|i| format!("cap {i}")).collect(),
            reasoning: String::new(),
        };
        let (captions, absorbed) = reconcile_bundle(&slides, 0, bundle, 3, &HashSet::new());
        assert_eq!(captions.len(), 3);
        assert_eq!(absorbed.len(), 2);
    }

    #[test]
    fn bundle_cap_respects_wish_and_floor() {
        let config = GenerationConfig::default();
        assert_eq!(bundle_cap(&config, None), 5);
        assert_eq!(bundle_cap(&config, Some(2)), 3);
        assert_eq!(bundle_cap(&config, Some(0)), 2);
        assert_eq!(bundle_cap(&config, Some(9)), 5);
    }

    #[test]
    fn missing_caption_falls_back_to_slide_text() {
        let slides = deck(&["zero", "one"]);
        let bundle = schema::LineBundle {
            bundled_slide_ids: vec!["s-0".into(), "s-1".into()],
            captions: vec!["only the first".into()],
            reasoning: String::new(),
        };
        let (captions, _) = reconcile_bundle(&slides, 0, bundle, 5, &HashSet::new());
        assert_eq!(captions, vec!["only the first", "one"]);
    }
}
