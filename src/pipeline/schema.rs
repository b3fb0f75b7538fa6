//! Validating parsers for LLM responses.
//!
//! Each pipeline stage defines an explicit response schema here, and parsing
//! failure is a first-class [`StageError::SchemaMismatch`] that feeds the
//! stage's fallback path — never a bare `serde_json::from_str` scattered
//! through the stages. Models also love wrapping JSON in markdown fences
//! despite being told not to; [`extract_json`] strips those before parsing.
//!
//! Numeric fields are clamped to their documented ranges rather than
//! rejected: a crispness of 150 from the model means "very crisp", not
//! "throw the whole chunk away".

use crate::error::StageError;
use crate::model::{DisplayMode, Preset, TextColor};
use serde::Deserialize;

/// Strip an outer markdown fence (```json … ``` or ``` … ```) if present.
pub fn extract_json(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

// ── Split stage ──────────────────────────────────────────────────────────

/// One scene as proposed by the split stage.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneResponse {
    #[serde(default)]
    pub scene_number: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub emotion: String,
    #[serde(default)]
    pub slides: Vec<SceneSlideResponse>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSlideResponse {
    pub full_script_text: String,
    #[serde(default)]
    pub has_image: bool,
    #[serde(default)]
    pub image_keyword: Option<String>,
}

/// Parse the split response: a JSON array of scenes.
pub fn parse_scenes(raw: &str) -> Result<Vec<SceneResponse>, StageError> {
    serde_json::from_str(extract_json(raw)).map_err(|e| StageError::SchemaMismatch {
        stage: "splitter",
        detail: e.to_string(),
    })
}

// ── Style stage ──────────────────────────────────────────────────────────

/// Per-slide decision from the Style Director.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDecision {
    pub slide_id: String,
    pub preset: Preset,
    #[serde(default)]
    pub display_mode: Option<DisplayMode>,
    /// 0–100, clamped.
    #[serde(default)]
    pub crispness: Option<i64>,
    #[serde(default = "default_text_color")]
    pub text_color: TextColor,
    #[serde(default)]
    pub bold_words: Vec<String>,
    #[serde(default)]
    pub underline_words: Vec<String>,
    #[serde(default)]
    pub circle_words: Vec<String>,
    #[serde(default)]
    pub red_words: Vec<String>,
    #[serde(default)]
    pub is_infographic: bool,
    /// 0–4, clamped.
    #[serde(default)]
    pub infographic_absorb_count: Option<i64>,
    #[serde(default)]
    pub is_headshot: bool,
}

fn default_text_color() -> TextColor {
    TextColor::Black
}

impl StyleDecision {
    /// Crispness clamped to 0–100, defaulting to 40.
    pub fn crispness_clamped(&self) -> u8 {
        self.crispness.unwrap_or(40).clamp(0, 100) as u8
    }

    /// Absorb count clamped to 0–4.
    pub fn absorb_count_clamped(&self) -> usize {
        self.infographic_absorb_count.unwrap_or(0).clamp(0, 4) as usize
    }

    /// The documented default decision applied to every slide in a failed
    /// chunk: white background, black text, no emphasis, nothing special.
    pub fn fallback(slide_id: impl Into<String>) -> Self {
        Self {
            slide_id: slide_id.into(),
            preset: Preset::WhiteBackground,
            display_mode: None,
            crispness: None,
            text_color: TextColor::Black,
            bold_words: Vec::new(),
            underline_words: Vec::new(),
            circle_words: Vec::new(),
            red_words: Vec::new(),
            is_infographic: false,
            infographic_absorb_count: None,
            is_headshot: false,
        }
    }
}

/// Parse the style response: a JSON array of decisions.
pub fn parse_style_decisions(raw: &str) -> Result<Vec<StyleDecision>, StageError> {
    serde_json::from_str(extract_json(raw)).map_err(|e| StageError::SchemaMismatch {
        stage: "style-director",
        detail: e.to_string(),
    })
}

// ── Infographic visual ───────────────────────────────────────────────────

/// Raw visual choice, before icon normalisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VisualChoice {
    Emoji { value: String },
    Icon { value: String },
    Svg { value: String },
}

pub fn parse_visual(raw: &str) -> Result<VisualChoice, StageError> {
    serde_json::from_str(extract_json(raw)).map_err(|e| StageError::SchemaMismatch {
        stage: "infographic-visual",
        detail: e.to_string(),
    })
}

// ── Infographic lines ────────────────────────────────────────────────────

/// Bundle of slides forming one infographic beat.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineBundle {
    #[serde(default)]
    pub bundled_slide_ids: Vec<String>,
    #[serde(default)]
    pub captions: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

pub fn parse_line_bundle(raw: &str) -> Result<LineBundle, StageError> {
    serde_json::from_str(extract_json(raw)).map_err(|e| StageError::SchemaMismatch {
        stage: "infographic-lines",
        detail: e.to_string(),
    })
}
