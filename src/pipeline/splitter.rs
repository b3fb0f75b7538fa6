//! Stage 1: split raw script text into scenes and slides.
//!
//! The script is cut into non-empty trimmed lines, batched, and each batch is
//! sent to the LLM to be grouped into narrative scenes. A batch that fails in
//! any way (HTTP error, non-JSON answer, transport fault) degrades to one
//! synthetic scene holding its raw sentences — the caller always gets every
//! line of the script back as a slide.
//!
//! After all batches return, scenes are renumbered 1..K in input order: the
//! model numbers scenes within its own batch and those numbers collide across
//! batches.

use crate::config::GenerationConfig;
use crate::error::StageError;
use crate::generate::Phase;
use crate::llm::{ChatRequest, LanguageModel, LlmError};
use crate::model::{Scene, SceneSlide, Slide};
use crate::pipeline::schema::{self, SceneResponse};
use crate::prompts;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Result of the split stage.
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    /// Scenes renumbered sequentially 1..K.
    pub scenes: Vec<Scene>,
    /// Batches that took the fallback path.
    pub fallback_batches: usize,
    pub total_slides: usize,
    pub image_slides: usize,
}

/// Split raw script text into non-empty trimmed lines.
pub fn split_sentences(script: &str) -> Vec<String> {
    script
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Run the split stage. `sentences` must be non-empty (the orchestrator
/// rejects empty scripts before calling in).
pub async fn run(
    llm: &Arc<dyn LanguageModel>,
    config: &GenerationConfig,
    sentences: &[String],
) -> SplitOutcome {
    let batches: Vec<&[String]> = sentences.chunks(config.sentence_batch).collect();
    let total_batches = batches.len();
    debug!(
        "Splitting {} sentences in {} batches",
        sentences.len(),
        total_batches
    );

    // Ordered fan-out: batches run up to `split_concurrency` at a time but
    // yield in input order, so renumbering below is deterministic.
    let results: Vec<(Vec<SceneResponse>, bool)> =
        stream::iter(batches.iter().enumerate().map(|(index, batch)| {
            let llm = Arc::clone(llm);
            let config = config.clone();
            async move {
                let outcome = process_batch(&llm, &config, batch, index, total_batches).await;
                if let Some(ref cb) = config.progress_callback {
                    cb.on_batch(Phase::Splitting, index + 1, total_batches, outcome.1);
                }
                outcome
            }
        }))
        .buffered(config.split_concurrency)
        .collect()
        .await;

    let fallback_batches = results.iter().filter(|(_, fell_back)| *fell_back).count();

    // Renumber sequentially, flattening batch results in input order.
    let mut scenes = Vec::new();
    for (batch_scenes, _) in results {
        for scene in batch_scenes {
            scenes.push(Scene {
                scene_number: scenes.len() as u32 + 1,
                title: scene.title,
                emotion: scene.emotion,
                slides: scene
                    .slides
                    .into_iter()
                    .map(|s| SceneSlide {
                        full_script_text: s.full_script_text,
                        has_image: s.has_image,
                        image_keyword: s.image_keyword,
                    })
                    .collect(),
            });
        }
    }

    let total_slides = scenes.iter().map(|s| s.slides.len()).sum();
    let image_slides = scenes
        .iter()
        .flat_map(|s| &s.slides)
        .filter(|s| s.has_image)
        .count();

    SplitOutcome {
        scenes,
        fallback_batches,
        total_slides,
        image_slides,
    }
}

/// Process one batch; never fails. Returns `(scenes, took_fallback)`.
async fn process_batch(
    llm: &Arc<dyn LanguageModel>,
    config: &GenerationConfig,
    sentences: &[String],
    batch_index: usize,
    total_batches: usize,
) -> (Vec<SceneResponse>, bool) {
    let request = ChatRequest {
        model: config.fast_model.clone(),
        max_tokens: config.max_tokens,
        temperature: Some(config.temperature),
        prompt: prompts::split_prompt(sentences, batch_index, total_batches),
    };

    let result = match llm.complete(&request).await {
        Ok(raw) => schema::parse_scenes(&raw),
        Err(e) => Err(llm_stage_error(e)),
    };

    match result {
        Ok(scenes) => (scenes, false),
        Err(stage_err) => {
            if stage_err.is_billing() {
                error!("AI split failed: out of credits or billing issue ({stage_err})");
            } else {
                warn!("Batch {batch_index} split failed, using fallback: {stage_err}");
            }
            (vec![fallback_scene(sentences, batch_index)], true)
        }
    }
}

fn llm_stage_error(e: LlmError) -> StageError {
    StageError::LlmFailed {
        stage: "splitter",
        detail: e.to_string(),
    }
}

/// One synthetic scene whose slides are the raw, unstyled sentences.
fn fallback_scene(sentences: &[String], batch_index: usize) -> SceneResponse {
    SceneResponse {
        scene_number: batch_index as u32 + 1,
        title: format!("Section {}", batch_index + 1),
        emotion: "neutral".to_string(),
        slides: sentences
            .iter()
            .map(|s| schema::SceneSlideResponse {
                full_script_text: s.clone(),
                has_image: false,
                image_keyword: None,
            })
            .collect(),
    }
}

/// Flatten scenes into slides, dropping duplicate lines.
///
/// Duplicates are detected on trimmed, lowercased text; the first occurrence
/// wins. Ordinals are assigned sequentially over the surviving slides.
pub fn flatten_scenes(scenes: Vec<Scene>) -> Vec<Slide> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut slides = Vec::new();

    for scene in scenes {
        for scene_slide in scene.slides {
            let normalized = scene_slide.full_script_text.trim().to_lowercase();
            if normalized.is_empty() || !seen.insert(normalized) {
                continue;
            }
            let mut slide = Slide::from_text(
                scene_slide.full_script_text,
                Some(scene.scene_number),
                Some(scene.title.clone()),
                Some(scene.emotion.clone()),
                scene_slide.image_keyword,
            );
            slide.ordinal = slides.len();
            slides.push(slide);
        }
    }

    slides
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Scene;

    #[test]
    fn split_sentences_trims_and_drops_blanks() {
        let script = "  First line.  \n\n\nSecond line.\n   \nThird.";
        let sentences = split_sentences(script);
        assert_eq!(sentences, vec!["First line.", "Second line.", "Third."]);
    }

    #[test]
    fn split_sentences_empty_script() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("\n \n\t\n").is_empty());
    }

    #[test]
    fn fallback_scene_preserves_lines() {
        let sentences = vec!["a".to_string(), "b".to_string()];
        let scene = fallback_scene(&sentences, 2);
        assert_eq!(scene.title, "Section 3");
        assert_eq!(scene.emotion, "neutral");
        assert_eq!(scene.slides.len(), 2);
        assert!(!scene.slides[0].has_image);
        assert!(scene.slides[0].image_keyword.is_none());
    }

    #[test]
    fn flatten_deduplicates_case_insensitively() {
        let scenes = vec![Scene {
            scene_number: 1,
            title: "S".into(),
            emotion: "neutral".into(),
            slides: vec![
                SceneSlide {
                    full_script_text: "Buy Now".into(),
                    has_image: false,
                    image_keyword: None,
                },
                SceneSlide {
                    full_script_text: "  buy now ".into(),
                    has_image: true,
                    image_keyword: Some("cta".into()),
                },
                SceneSlide {
                    full_script_text: "Different".into(),
                    has_image: false,
                    image_keyword: None,
                },
            ],
        }];
        let slides = flatten_scenes(scenes);
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].full_script_text, "Buy Now");
        assert_eq!(slides[1].full_script_text, "Different");
        assert_eq!(slides[0].ordinal, 0);
        assert_eq!(slides[1].ordinal, 1);
    }

    #[test]
    fn flatten_carries_scene_metadata() {
        let scenes = vec![Scene {
            scene_number: 7,
            title: "Proof".into(),
            emotion: "authority".into(),
            slides: vec![SceneSlide {
                full_script_text: "We measured it".into(),
                has_image: true,
                image_keyword: Some("laboratory scientist".into()),
            }],
        }];
        let slides = flatten_scenes(scenes);
        assert_eq!(slides[0].scene_number, Some(7));
        assert_eq!(slides[0].scene_title.as_deref(), Some("Proof"));
        assert_eq!(slides[0].emotion.as_deref(), Some("authority"));
        assert_eq!(
            slides[0].image_keyword.as_deref(),
            Some("laboratory scientist")
        );
    }
}
