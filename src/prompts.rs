//! Prompts for every LLM-backed pipeline stage, plus the icon lookup table.
//!
//! Centralising the prompts here keeps the stage modules focused on
//! orchestration and fallback logic, and lets unit tests inspect prompt
//! construction without a live model.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Fixed icon-name → emoji table.
///
/// The infographic-visual stage lets the model answer with a named icon from
/// this list; the name is normalised to its emoji before a slide is written.
/// Names the model invents outside the table fall back to
/// [`FALLBACK_EMOJI`].
pub static ICON_LIBRARY: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // Science / medical
        ("brain", "🧠"),
        ("dna", "🧬"),
        ("microscope", "🔬"),
        ("pill", "💊"),
        ("heart", "❤️"),
        ("syringe", "💉"),
        // Business / money
        ("money", "💰"),
        ("chart", "📈"),
        ("rocket", "🚀"),
        ("trophy", "🏆"),
        ("target", "🎯"),
        ("lightbulb", "💡"),
        // Emotions
        ("happy", "😊"),
        ("sad", "😢"),
        ("angry", "😠"),
        ("shocked", "😱"),
        ("love", "💕"),
        ("fire", "🔥"),
        ("star", "⭐"),
        // People / actions
        ("person", "👤"),
        ("group", "👥"),
        ("handshake", "🤝"),
        ("thumbsup", "👍"),
        ("clap", "👏"),
        ("muscle", "💪"),
        // Objects
        ("book", "📖"),
        ("clock", "⏰"),
        ("key", "🔑"),
        ("lock", "🔒"),
        ("shield", "🛡️"),
        ("warning", "⚠️"),
        ("checkmark", "✅"),
    ])
});

/// Emoji used whenever the visual stage cannot produce a better answer.
pub const FALLBACK_EMOJI: &str = "💡";

/// Build the split-stage prompt for one batch of numbered sentences.
pub fn split_prompt(sentences: &[String], batch_index: usize, total_batches: usize) -> String {
    let numbered = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Split these VSL script lines into slides grouped by scenes. This is chunk {chunk} of {total}.

RULES:
- Each slide = 1-2 lines (keep short)
- DO NOT repeat the same text across multiple slides. Each unique line from the script should appear exactly once in the entire output.
- Group into scenes (Hook, Problem, Agitation, Solution, Authority, Proof, CTA, Close)
- Mark EVERY slide (100%) as hasImage:true
- IMPORTANT: For EVERY slide, provide an imageKeyword — a descriptive cinematic stock photo search term.
- Return ONLY a valid JSON array of scenes.

Format: [{{"sceneNumber":1,"title":"Scene Name","emotion":"hook","slides":[{{"fullScriptText":"text here","hasImage":true,"imageKeyword":"visual search term"}}]}}]

LINES:
{numbered}"#,
        chunk = batch_index + 1,
        total = total_batches,
        numbered = numbered,
    )
}

/// One slide's line in the style prompt.
pub struct StyleSlideLine<'a> {
    pub id: &'a str,
    pub text: &'a str,
    pub scene_title: Option<&'a str>,
    pub emotion: Option<&'a str>,
    pub has_image: bool,
}

/// Build the style-stage prompt for one chunk of slides.
///
/// `previous` carries the tail of earlier decisions (`id: preset` pairs) so
/// the model keeps variety across chunk boundaries; `directive` is the
/// caller's free-text art direction.
pub fn style_prompt(
    slides: &[StyleSlideLine<'_>],
    chunk_index: usize,
    chunk_size: usize,
    total_slides: usize,
    previous: &str,
    directive: Option<&str>,
) -> String {
    let slides_text = slides
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "{}. [{}] \"{}\" (scene: {}, emotion: {}, hasImage: {})",
                chunk_index * chunk_size + i + 1,
                s.id,
                s.text,
                s.scene_title.unwrap_or("unknown"),
                s.emotion.unwrap_or("neutral"),
                s.has_image,
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let previous_block = if previous.is_empty() {
        String::new()
    } else {
        format!("PREVIOUS STYLING DECISIONS (for context/variety):\n{previous}\n")
    };
    let directive_block = directive
        .map(|d| format!("ART DIRECTION FROM THE USER (obey where it applies):\n{d}\n"))
        .unwrap_or_default();

    format!(
        r#"You are an expert VSL (Video Sales Letter) slide designer. Analyze these slides and decide the PERFECT styling for each one.

TOTAL SLIDES IN PROJECT: {total_slides}
{previous_block}{directive_block}
SLIDES TO STYLE:
{slides_text}

FOR EACH SLIDE, DECIDE:

1. **PRESET** - Pick the best visual style:
   - "black-background" — Clean, dramatic, for punchy statements, CTAs
   - "white-background" — Clean, professional, for simple facts
   - "headshot-bio" — When speaker introduces themselves ("I'm Dr. X", "My name is", etc.)
   - "image-backdrop" — Emotional moments, visual scenes, stories (needs image behind text)
   - "image-text" — Split layout, image on top, text below (good for showing + telling)
   - "infographic" — Teaching moments, explaining science/stats, lists of benefits

2. **DISPLAY MODE** (for image presets only):
   - "blurred" — Soft background, text readable (most common)
   - "crisp" — Clear image visible, text overlay
   - "split" — Image top half, text bottom half

3. **CRISPNESS** (0-100, for blurred mode): 20-40 is usually good

4. **TEXT COLOR**: "white" for dark/image backgrounds, "black" for light backgrounds

5. **WORD EMPHASIS** (pick 0-3 key words per slide):
   - boldWords: Power words, benefits, key phrases
   - underlineWords: Important terms that need highlighting
   - circleWords: Critical numbers, warnings, key takeaways (use sparingly)
   - redWords: Danger words, warnings, pain points

6. **INFOGRAPHIC**: Set true if this is an "explain" moment. Set infographicAbsorbCount to how many NEXT slides should be bundled as cycling captions (0-4).

7. **HEADSHOT**: Set true if speaker is introducing themselves.

VARIETY RULES:
- Never use the same preset twice in a row
- Use at least 3 different presets within any 10 consecutive slides
- Mix text-only and image slides
- Use infographic for 1-2 teaching moments per script
- Headshot only when speaker literally introduces themselves
- Not every slide needs word emphasis — sometimes clean text is best

Return ONLY valid JSON array (no markdown):
[
  {{
    "slideId": "abc",
    "preset": "image-backdrop",
    "displayMode": "blurred",
    "crispness": 40,
    "textColor": "white",
    "boldWords": ["breakthrough"],
    "underlineWords": [],
    "circleWords": [],
    "redWords": [],
    "isInfographic": false,
    "infographicAbsorbCount": 0,
    "isHeadshot": false
  }}
]"#,
    )
}

/// Build the image-keyword inference prompt for a single slide.
pub fn keyword_prompt(slide_text: &str, emotion: Option<&str>, scene_title: Option<&str>) -> String {
    let emotion_line = emotion
        .map(|e| format!("Emotion: {e}\n"))
        .unwrap_or_default();
    let scene_line = scene_title
        .map(|s| format!("Scene: {s}\n"))
        .unwrap_or_default();
    format!(
        r#"Generate a 2-4 word stock photo search term that visually represents this text. The term should describe a scene, person, or concept that a stock photo site would have.

Text: "{slide_text}"
{emotion_line}{scene_line}
Reply with ONLY the search term, nothing else. Examples:
- "You watched your mom struggle to read" → "mother reading difficulty"
- "We made $2 million" → "business success celebration"
- "I was broke and desperate" → "stressed person finances""#,
    )
}

/// Build the infographic-visual prompt.
pub fn visual_prompt(text: &str, context: &str) -> String {
    let icons = {
        let mut names: Vec<&str> = ICON_LIBRARY.keys().copied().collect();
        names.sort_unstable();
        names.join(", ")
    };
    format!(
        r#"You're creating a visual element for an infographic slide in a video sales letter.

TEXT: "{text}"
EMOTION/CONTEXT: {context}

Decide the BEST visual approach for this content:

1. "emoji" - Use when a single emoji perfectly captures the concept (simple, universal ideas)
2. "icon" - Use when content maps to common visual concepts (money, health, success, etc.)
3. "svg" - Use when content is abstract, unique, or deserves a custom illustration

RULES:
- Prefer simplicity — emoji/icon when they work well
- Use SVG for complex concepts, metaphors, or when a custom visual would be more impactful
- SVGs should be clean, minimal line art style
- SVGs must be valid, self-contained, viewBox="0 0 100 100", stroke-based, no external dependencies

Return ONLY valid JSON (no markdown):
{{
  "type": "emoji" | "icon" | "svg",
  "value": "the emoji character" | "icon name from library" | "complete SVG code",
  "reasoning": "brief explanation of choice"
}}

ICON LIBRARY: {icons}

If type is "svg", the value should be complete SVG markup like:
<svg viewBox="0 0 100 100" xmlns="http://www.w3.org/2000/svg">...</svg>"#,
    )
}

/// One slide's line in the line-bundling prompt.
pub struct BundleSlideLine<'a> {
    pub id: &'a str,
    pub text: &'a str,
    pub emotion: Option<&'a str>,
}

/// Build the infographic line-bundling prompt.
///
/// `slides[0]` must be the trigger slide; the rest are the following slides
/// in order (at most 10).
pub fn lines_prompt(slides: &[BundleSlideLine<'_>], max_lines: usize) -> String {
    let slides_text = slides
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let emotion = s.emotion.map(|e| format!(" ({e})")).unwrap_or_default();
            format!("{}. [{}] \"{}\"{}", i + 1, s.id, s.text, emotion)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You're creating an infographic slide for a Video Sales Letter. The first slide will become an infographic that "holds" while multiple lines of script play as cycling captions.

Analyze these slides and decide which ones should be BUNDLED together into the infographic:

{slides_text}

LOOK FOR "EXPLAIN" OR "TEACH" MOMENTS:
- A doctor/expert explaining something
- Science or technical explanations
- Lists of benefits or features
- Emotional build-up moments
- Story beats that flow together

RULES:
- Always include slide 1 (the trigger slide)
- Bundle 2-{max_lines} total lines that form a coherent "moment"
- Stop bundling when the topic/emotion clearly shifts
- Don't bundle unrelated content just to fill quota
- Return the slide IDs to absorb and the caption text for each

Return ONLY valid JSON (no markdown):
{{
  "bundledSlideIds": ["id1", "id2", ...],
  "captions": ["First caption text", "Second caption text", ...],
  "reasoning": "Brief explanation of why these lines belong together"
}}"#,
    )
}
