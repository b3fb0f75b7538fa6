//! Stage 3: resolve background images for slides that want one.
//!
//! Lookups run sequentially (stock-photo APIs rate-limit hard; a paced single
//! file stays inside the window where a burst would trip it). Provider health
//! is tracked by one [`CircuitBreaker`] per provider: a 429 from the primary
//! takes it out for the rest of the run and every later lookup goes straight
//! to the secondary. A keyword that merely returns no hits on the primary
//! falls through to the secondary for that keyword only.
//!
//! Repeated keywords are served from an in-run cache. Lookup failures leave
//! the slide imageless; the stage never aborts.

use crate::config::GenerationConfig;
use crate::generate::CancelToken;
use crate::llm::{ChatRequest, LanguageModel};
use crate::model::{BackgroundKind, DisplayMode, Slide};
use crate::photos::breaker::CircuitBreaker;
use crate::photos::{Photo, PhotoError, StockPhotoProvider};
use crate::prompts;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Result of the image stage.
#[derive(Debug, Clone, Default)]
pub struct ImageOutcome {
    /// Slides that wanted an image.
    pub attempted: usize,
    /// Slides that got one.
    pub resolved: usize,
}

/// Keyword lookup with caching and breaker-driven provider selection.
///
/// Scoped to a single generation run; nothing here is shared across runs or
/// users.
pub struct KeywordResolver {
    primary: Arc<dyn StockPhotoProvider>,
    secondary: Arc<dyn StockPhotoProvider>,
    primary_breaker: CircuitBreaker,
    secondary_breaker: CircuitBreaker,
    cache: HashMap<String, Photo>,
    primary_delay: Duration,
    secondary_delay: Duration,
}

impl KeywordResolver {
    pub fn new(
        primary: Arc<dyn StockPhotoProvider>,
        secondary: Arc<dyn StockPhotoProvider>,
        config: &GenerationConfig,
    ) -> Self {
        let cooldown = Duration::from_secs(config.breaker_cooldown_secs);
        Self {
            primary,
            secondary,
            primary_breaker: CircuitBreaker::new(3, cooldown),
            secondary_breaker: CircuitBreaker::new(3, cooldown),
            cache: HashMap::new(),
            primary_delay: Duration::from_millis(config.primary_lookup_delay_ms),
            secondary_delay: Duration::from_millis(config.secondary_lookup_delay_ms),
        }
    }

    /// Resolve one keyword to a photo, or `None` when no provider delivers.
    pub async fn lookup(&mut self, keyword: &str) -> Option<Photo> {
        let cache_key = keyword.trim().to_lowercase();
        if let Some(photo) = self.cache.get(&cache_key) {
            debug!("Image cache hit for '{keyword}'");
            return Some(photo.clone());
        }

        let mut photo = None;

        if self.primary_breaker.allows_request() {
            photo = match self.query(true, keyword).await {
                Ok(hit) => hit,
                Err(e) => {
                    self.note_failure(true, &e);
                    None
                }
            };
        }

        if photo.is_none() && self.secondary_breaker.allows_request() {
            photo = match self.query(false, keyword).await {
                Ok(hit) => hit,
                Err(e) => {
                    self.note_failure(false, &e);
                    None
                }
            };
        }

        if let Some(ref photo) = photo {
            self.cache.insert(cache_key, photo.clone());
        }
        photo
    }

    async fn query(&mut self, primary: bool, keyword: &str) -> Result<Option<Photo>, PhotoError> {
        let provider = if primary {
            &self.primary
        } else {
            &self.secondary
        };
        let result = provider.search(keyword, 1).await;
        // Pace the next call against this provider's rate window.
        sleep(if primary {
            self.primary_delay
        } else {
            self.secondary_delay
        })
        .await;

        let photos = result?;
        let breaker = if primary {
            &mut self.primary_breaker
        } else {
            &mut self.secondary_breaker
        };
        breaker.on_success();
        Ok(photos.into_iter().next())
    }

    fn note_failure(&mut self, primary: bool, error: &PhotoError) {
        let (name, breaker) = if primary {
            (self.primary.name(), &mut self.primary_breaker)
        } else {
            (self.secondary.name(), &mut self.secondary_breaker)
        };
        breaker.on_failure(error.status());
        match error {
            PhotoError::RateLimited { .. } if primary => {
                info!("'{name}' rate limited; switching to secondary provider for this run");
            }
            _ => warn!("'{name}' lookup failed: {error}"),
        }
    }
}

/// Run the image stage, mutating `slides` in place.
pub async fn run(
    primary: Arc<dyn StockPhotoProvider>,
    secondary: Arc<dyn StockPhotoProvider>,
    config: &GenerationConfig,
    cancel: &CancelToken,
    slides: &mut [Slide],
) -> ImageOutcome {
    let mut resolver = KeywordResolver::new(primary, secondary, config);

    let wanting: Vec<usize> = slides
        .iter()
        .enumerate()
        .filter(|(_, s)| s.needs_image())
        .map(|(i, _)| i)
        .collect();
    let attempted = wanting.len();
    debug!("{attempted} slides need images");

    let mut resolved = 0;
    for (done, index) in wanting.into_iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        let slide = &mut slides[index];
        let keyword = match slide.image_keyword.clone() {
            Some(k) => k,
            None => continue,
        };

        let photo = resolver.lookup(&keyword).await;
        let got_one = photo.is_some();
        if let Some(photo) = photo {
            apply_photo(slide, photo);
            resolved += 1;
        }

        if let Some(ref cb) = config.progress_callback {
            cb.on_slide_resolved(done + 1, attempted, got_one);
        }
    }

    ImageOutcome {
        attempted,
        resolved,
    }
}

/// Complete the slide's background descriptor with the resolved photo.
///
/// A slide the Style Director left without an explicit layout alternates by
/// ordinal parity: even → split at full opacity, odd → blurred backdrop at
/// reduced opacity.
pub fn apply_photo(slide: &mut Slide, photo: Photo) {
    let ordinal = slide.ordinal;
    if let Some(bg) = slide.background_image.as_mut() {
        bg.url = photo.url;
        if bg.display_mode.is_none() {
            if ordinal % 2 == 0 {
                bg.display_mode = Some(DisplayMode::Split);
                bg.opacity = 100;
                bg.blur = 0;
                bg.image_position_y = Some(35);
                slide.style.background = BackgroundKind::Split;
                slide.style.split_ratio = Some(50);
            } else {
                bg.display_mode = Some(DisplayMode::Blurred);
                bg.opacity = 40;
                bg.blur = 8;
            }
        }
    }
}

/// Infer a 2–4 word stock-photo search term for a slide.
///
/// Used by the manual image dialog when a slide carries no keyword yet.
/// Any failure falls back to the slide's first three words (or a generic
/// term for empty text) — the caller always gets something searchable.
pub async fn infer_keyword(
    llm: &Arc<dyn LanguageModel>,
    config: &GenerationConfig,
    slide_text: &str,
    emotion: Option<&str>,
    scene_title: Option<&str>,
) -> String {
    let request = ChatRequest {
        model: config.fast_model.clone(),
        max_tokens: 100,
        temperature: Some(config.temperature),
        prompt: prompts::keyword_prompt(slide_text, emotion, scene_title),
    };

    match llm.complete(&request).await {
        Ok(raw) => {
            let keyword = raw.trim().replace(['\'', '"'], "");
            if keyword.is_empty() {
                fallback_keyword(slide_text)
            } else {
                keyword
            }
        }
        Err(e) => {
            warn!("Keyword inference failed, extracting from text: {e}");
            fallback_keyword(slide_text)
        }
    }
}

fn fallback_keyword(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().take(3).collect();
    if words.is_empty() {
        "abstract background".to_string()
    } else {
        words.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BackgroundImage;

    fn slide_with_skeleton(ordinal: usize) -> Slide {
        let mut s = Slide::from_text("text", None, None, None, Some("kw".into()));
        s.ordinal = ordinal;
        s.has_background_image = true;
        s.background_image = Some(BackgroundImage {
            url: String::new(),
            opacity: 40,
            blur: 8,
            display_mode: None,
            image_position_y: None,
        });
        s
    }

    fn photo() -> Photo {
        Photo {
            url: "https://img/1.jpg".into(),
            thumbnail: None,
            photographer: None,
        }
    }

    #[test]
    fn even_ordinal_gets_split_layout() {
        let mut s = slide_with_skeleton(4);
        apply_photo(&mut s, photo());
        let bg = s.background_image.as_ref().unwrap();
        assert_eq!(bg.display_mode, Some(DisplayMode::Split));
        assert_eq!(bg.opacity, 100);
        assert_eq!(s.style.background, BackgroundKind::Split);
        assert_eq!(s.style.split_ratio, Some(50));
    }

    #[test]
    fn odd_ordinal_gets_blurred_backdrop() {
        let mut s = slide_with_skeleton(3);
        apply_photo(&mut s, photo());
        let bg = s.background_image.as_ref().unwrap();
        assert_eq!(bg.display_mode, Some(DisplayMode::Blurred));
        assert_eq!(bg.opacity, 40);
        assert_eq!(bg.blur, 8);
    }

    #[test]
    fn fallback_keyword_takes_three_words() {
        assert_eq!(
            fallback_keyword("You watched your mom struggle"),
            "You watched your"
        );
        assert_eq!(fallback_keyword("   "), "abstract background");
    }

    #[test]
    fn explicit_layout_is_untouched() {
        let mut s = slide_with_skeleton(2);
        if let Some(bg) = s.background_image.as_mut() {
            bg.display_mode = Some(DisplayMode::Crisp);
            bg.opacity = 70;
        }
        apply_photo(&mut s, photo());
        let bg = s.background_image.as_ref().unwrap();
        assert_eq!(bg.display_mode, Some(DisplayMode::Crisp));
        assert_eq!(bg.opacity, 70);
        assert_eq!(bg.url, "https://img/1.jpg");
    }
}
