//! Domain model: projects, slides, scenes, and the visual style vocabulary.
//!
//! Slides are persisted as JSON blobs, so every type here derives
//! `Serialize`/`Deserialize` with camelCase wire names matching the stored
//! documents. The [`Preset`] → [`SlideStyle`] mapping is the one deterministic
//! piece of the Style Director: the LLM picks the preset, this module decides
//! what the preset means.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ── Style vocabulary ─────────────────────────────────────────────────────

/// Per-word emphasis kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emphasis {
    #[default]
    None,
    Bold,
    Underline,
    Circle,
    Red,
}

/// Underline rendering variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnderlineStyle {
    #[default]
    BrushRed,
    BrushBlack,
    Regular,
    BrushStrokeRed,
}

/// Circle rendering variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircleStyle {
    #[default]
    RedSolid,
    RedDotted,
    BlackSolid,
}

/// Slide background archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundKind {
    #[default]
    White,
    Dark,
    Image,
    Gradient,
    Split,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextColor {
    White,
    #[default]
    Black,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextWeight {
    Regular,
    #[default]
    Bold,
    Extrabold,
}

/// How a background image blends with the text layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Soft backdrop at reduced opacity, text on top.
    Blurred,
    /// Image fully visible, text overlaid.
    Crisp,
    /// Image in the top half, text below.
    Split,
}

/// The six enumerated layout archetypes the Style Director chooses from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    BlackBackground,
    WhiteBackground,
    HeadshotBio,
    ImageBackdrop,
    ImageText,
    Infographic,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::BlackBackground => "black-background",
            Preset::WhiteBackground => "white-background",
            Preset::HeadshotBio => "headshot-bio",
            Preset::ImageBackdrop => "image-backdrop",
            Preset::ImageText => "image-text",
            Preset::Infographic => "infographic",
        }
    }
}

// ── Slide components ─────────────────────────────────────────────────────

/// One word of slide text with its emphasis decoration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSegment {
    pub text: String,
    #[serde(default)]
    pub emphasis: Emphasis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline_style: Option<UnderlineStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circle_style: Option<CircleStyle>,
}

/// Background image descriptor. The Style Director installs this with an
/// empty `url`; the Image Resolver fills it in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundImage {
    pub url: String,
    /// 0–100. How much of the image shows through the readability overlay.
    pub opacity: u8,
    /// 0–20 px.
    pub blur: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_mode: Option<DisplayMode>,
    /// 0–100 % vertical crop position in split mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_position_y: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideStyle {
    pub background: BackgroundKind,
    pub text_color: TextColor,
    /// One of 48, 60, 72, 84, 96, 108, 120.
    pub text_size: u16,
    pub text_weight: TextWeight,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient_name: Option<String>,
    /// 50–70 % for split layouts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_ratio: Option<u8>,
}

impl Default for SlideStyle {
    fn default() -> Self {
        Self {
            background: BackgroundKind::White,
            text_color: TextColor::Black,
            text_size: 120,
            text_weight: TextWeight::Bold,
            gradient: None,
            gradient_name: None,
            split_ratio: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadshotSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// The single visual element an infographic slide holds while captions cycle.
///
/// `Icon` never survives the pipeline: icon names are normalised to emoji
/// through the lookup table in [`crate::prompts`] before a slide is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum InfographicVisual {
    Emoji(String),
    Svg(String),
}

/// Audio narration attached to a slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideAudio {
    /// `data:audio/mpeg;base64,…` URL as returned by the TTS proxy.
    pub url: String,
    /// Seconds.
    pub duration: f64,
    pub generated: bool,
}

// ── Slide ────────────────────────────────────────────────────────────────

/// One slide of the deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    pub id: String,
    /// Position within the project. Contiguous and unique, maintained by
    /// [`crate::store`].
    pub ordinal: usize,
    pub full_script_text: String,
    pub segments: Vec<TextSegment>,
    pub style: SlideStyle,

    // Word emphasis
    pub bold_words: Vec<String>,
    pub underline_words: Vec<String>,
    pub circle_words: Vec<String>,
    pub red_words: Vec<String>,
    pub underline_styles: HashMap<String, UnderlineStyle>,
    pub circle_styles: HashMap<String, CircleStyle>,

    // Background image
    pub has_background_image: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<BackgroundImage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<SlideAudio>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headshot: Option<HeadshotSettings>,

    // Infographic mode
    #[serde(default)]
    pub is_infographic: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub infographic_captions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infographic_visual: Option<InfographicVisual>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub absorbed_slide_ids: Vec<String>,

    // Scene metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_keyword: Option<String>,

    #[serde(default)]
    pub reviewed: bool,
}

impl Slide {
    /// Build an unstyled slide from a line of script text.
    ///
    /// Text size scales down with word count so long lines still fit the
    /// 1920×1080 canvas.
    pub fn from_text(
        text: impl Into<String>,
        scene_number: Option<u32>,
        scene_title: Option<String>,
        emotion: Option<String>,
        image_keyword: Option<String>,
    ) -> Self {
        let text = text.into();
        let words: Vec<&str> = text.split_whitespace().collect();
        let segments = words
            .iter()
            .map(|w| TextSegment {
                text: (*w).to_string(),
                emphasis: Emphasis::None,
                underline_style: None,
                circle_style: None,
            })
            .collect();

        Self {
            id: Uuid::new_v4().to_string(),
            ordinal: 0,
            segments,
            style: SlideStyle {
                text_size: text_size_for(words.len()),
                ..SlideStyle::default()
            },
            full_script_text: text,
            bold_words: Vec::new(),
            underline_words: Vec::new(),
            circle_words: Vec::new(),
            red_words: Vec::new(),
            underline_styles: HashMap::new(),
            circle_styles: HashMap::new(),
            has_background_image: false,
            background_image: None,
            audio: None,
            headshot: None,
            is_infographic: false,
            infographic_captions: Vec::new(),
            infographic_visual: None,
            absorbed_slide_ids: Vec::new(),
            scene_number,
            scene_title,
            emotion,
            image_keyword,
            reviewed: false,
        }
    }

    /// True when the Image Resolver still owes this slide a picture.
    pub fn needs_image(&self) -> bool {
        self.has_background_image
            && self
                .background_image
                .as_ref()
                .map(|bg| bg.url.is_empty())
                .unwrap_or(false)
            && self.image_keyword.is_some()
    }
}

/// Auto-size text from word count.
pub fn text_size_for(word_count: usize) -> u16 {
    match word_count {
        0..=6 => 120,
        7..=10 => 96,
        11..=15 => 72,
        _ => 60,
    }
}

// ── Scenes (pipeline-internal) ───────────────────────────────────────────

/// A narrative beat grouping slides. Never persisted as its own row —
/// flattened into per-slide metadata after the split stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub scene_number: u32,
    pub title: String,
    pub emotion: String,
    pub slides: Vec<SceneSlide>,
}

/// A slide as proposed by the split stage, before styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSlide {
    pub full_script_text: String,
    pub has_image: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_keyword: Option<String>,
}

// ── Project ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioSettings {
    pub voice_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_name: Option<String>,
    /// 0–1.
    pub stability: f32,
    /// 0–1.
    pub similarity_boost: f32,
    /// 0.7–1.2.
    pub speed: f32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            voice_id: String::new(),
            voice_name: None,
            stability: 0.5,
            similarity_boost: 0.75,
            speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioSettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// A project row plus its ordered slide rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub owner: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_script: Option<String>,
    pub slides: Vec<Slide>,
    #[serde(default)]
    pub settings: ProjectSettings,
    /// Unix millis.
    pub created_at: u64,
    pub updated_at: u64,
}

impl Project {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, now_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner: owner.into(),
            name: name.into(),
            original_script: None,
            slides: Vec::new(),
            settings: ProjectSettings::default(),
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// The review gate: audio and export stages require every slide reviewed.
    pub fn all_reviewed(&self) -> bool {
        self.slides.iter().all(|s| s.reviewed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_size_scales_with_word_count() {
        assert_eq!(text_size_for(3), 120);
        assert_eq!(text_size_for(6), 120);
        assert_eq!(text_size_for(10), 96);
        assert_eq!(text_size_for(15), 72);
        assert_eq!(text_size_for(30), 60);
    }

    #[test]
    fn slide_from_text_builds_segments() {
        let s = Slide::from_text("hello brave new world", None, None, None, None);
        assert_eq!(s.segments.len(), 4);
        assert_eq!(s.segments[1].text, "brave");
        assert!(!s.has_background_image);
        assert_eq!(s.style.text_size, 120);
    }

    #[test]
    fn needs_image_requires_keyword_and_empty_url() {
        let mut s = Slide::from_text("x", None, None, None, Some("sunset".into()));
        assert!(!s.needs_image());

        s.has_background_image = true;
        s.background_image = Some(BackgroundImage {
            url: String::new(),
            opacity: 40,
            blur: 8,
            display_mode: None,
            image_position_y: None,
        });
        assert!(s.needs_image());

        if let Some(bg) = s.background_image.as_mut() {
            bg.url = "https://images.example/1.jpg".to_string();
        }
        assert!(!s.needs_image());
    }

    #[test]
    fn infographic_visual_wire_format() {
        let v = InfographicVisual::Emoji("💡".into());
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"type":"emoji","value":"💡"}"#);

        let back: InfographicVisual =
            serde_json::from_str(r#"{"type":"svg","value":"<svg viewBox=\"0 0 100 100\"/>"}"#)
                .unwrap();
        assert!(matches!(back, InfographicVisual::Svg(_)));
    }

    #[test]
    fn preset_wire_names_are_kebab_case() {
        let p: Preset = serde_json::from_str(r#""image-backdrop""#).unwrap();
        assert_eq!(p, Preset::ImageBackdrop);
        assert_eq!(p.as_str(), "image-backdrop");
    }
}
