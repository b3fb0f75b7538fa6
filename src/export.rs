//! Export: rasterise slides, package a ZIP, or compose a video remotely.
//!
//! Every slide renders to a fixed 1920×1080 PNG through a remote
//! HTML-to-image service; slides with generated audio contribute an MP3
//! decoded from their stored data-URL. Artifacts are packaged into a ZIP, or
//! the rendered frames go to a remote video-composition service that is
//! polled until the MP4 is ready.
//!
//! Unlike the generation stages, export failures are fatal to the export
//! operation: the caller gets the raw reason instead of a silently degraded
//! archive. Transient upstream trouble (429/5xx/transport) is retried with
//! exponential backoff first.

use crate::config::RetryPolicy;
use crate::error::VslError;
use crate::model::{BackgroundKind, DisplayMode, Slide, TextColor};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::io::Write;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Output canvas, fixed.
pub const RENDER_WIDTH: u32 = 1920;
pub const RENDER_HEIGHT: u32 = 1080;

/// Seconds between video-job status polls.
const VIDEO_POLL_INTERVAL_SECS: u64 = 3;
/// Poll budget before giving up on a video job.
const VIDEO_POLL_MAX_ATTEMPTS: u32 = 60;

// ── Retry/backoff helper ─────────────────────────────────────────────────

/// Send a request, retrying 429/5xx responses and transport errors with
/// exponential backoff.
///
/// `make` rebuilds the request for every attempt (a sent `RequestBuilder`
/// is consumed).
pub async fn send_with_retry<F>(
    make: F,
    policy: &RetryPolicy,
    service: &str,
) -> Result<reqwest::Response, VslError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt: u32 = 0;
    loop {
        match make().send().await {
            Ok(response) => {
                let status = response.status();
                let retryable = status.as_u16() == 429 || status.is_server_error();
                if retryable && attempt < policy.max_retries {
                    attempt += 1;
                    let delay = policy.delay_ms(attempt);
                    warn!("{service} answered {status}; retry {attempt}/{} in {delay}ms", policy.max_retries);
                    sleep(Duration::from_millis(delay)).await;
                    continue;
                }
                return Ok(response);
            }
            Err(e) if attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_ms(attempt);
                warn!("{service} transport error ({e}); retry {attempt}/{} in {delay}ms", policy.max_retries);
                sleep(Duration::from_millis(delay)).await;
            }
            Err(e) => {
                return Err(VslError::Http {
                    service: service.to_string(),
                    detail: e.to_string(),
                });
            }
        }
    }
}

// ── Slide HTML ───────────────────────────────────────────────────────────

/// Render a slide to the HTML document the rasterisation service consumes.
///
/// Word emphasis is applied per token: bold/red wrap in styled spans,
/// underline and circle fall back to text decorations (the interactive
/// editor draws those as SVG overlays, which a headless rasteriser cannot).
pub fn slide_html(slide: &Slide) -> String {
    let (background_css, text_css) = background_styles(slide);

    let words: Vec<String> = slide
        .full_script_text
        .split_whitespace()
        .map(|word| decorate_word(slide, word))
        .collect();

    format!(
        "<div class=\"slide\" style=\"width:{w}px;height:{h}px;display:flex;align-items:center;justify-content:center;text-align:center;font-family:Inter,sans-serif;font-weight:700;{background}\">\
<p style=\"font-size:{size}px;margin:0 8%;{text}\">{body}</p>\
</div>",
        w = RENDER_WIDTH,
        h = RENDER_HEIGHT,
        background = background_css,
        size = slide.style.text_size,
        text = text_css,
        body = words.join(" "),
    )
}

fn background_styles(slide: &Slide) -> (String, String) {
    let text_color = match slide.style.text_color {
        TextColor::White => "color:#ffffff;",
        _ => "color:#111111;",
    };

    let background = match slide.style.background {
        BackgroundKind::Dark => "background:#111111;".to_string(),
        BackgroundKind::White => "background:#ffffff;".to_string(),
        BackgroundKind::Gradient => slide
            .style
            .gradient
            .as_ref()
            .map(|g| format!("background:{g};"))
            .unwrap_or_else(|| "background:#667eea;".to_string()),
        BackgroundKind::Image | BackgroundKind::Split => slide
            .background_image
            .as_ref()
            .filter(|bg| !bg.url.is_empty())
            .map(|bg| {
                let blur = match bg.display_mode {
                    Some(DisplayMode::Blurred) => format!("filter:blur({}px);", bg.blur),
                    _ => String::new(),
                };
                format!(
                    "background-image:url('{}');background-size:cover;background-position:center;{}",
                    bg.url, blur
                )
            })
            .unwrap_or_else(|| "background:#ffffff;".to_string()),
    };

    (background, text_color.to_string())
}

fn decorate_word(slide: &Slide, word: &str) -> String {
    let bare: String = word
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    let matches = |list: &[String]| list.iter().any(|w| w.to_lowercase() == bare);

    let escaped = html_escape(word);
    if matches(&slide.red_words) {
        format!("<span style=\"color:#e11d48;font-weight:800\">{escaped}</span>")
    } else if matches(&slide.bold_words) {
        format!("<b>{escaped}</b>")
    } else if matches(&slide.underline_words) {
        format!("<u>{escaped}</u>")
    } else if matches(&slide.circle_words) {
        format!("<span style=\"text-decoration:underline overline\">{escaped}</span>")
    } else {
        escaped
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ── Rasterisation ────────────────────────────────────────────────────────

/// A slide → PNG backend.
#[async_trait]
pub trait SlideRenderer: Send + Sync {
    async fn render(&self, slide: &Slide) -> Result<Vec<u8>, VslError>;
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    url: String,
}

/// Remote HTML-to-image client (htmlcsstoimage-style API).
#[derive(Debug, Clone)]
pub struct RemoteRenderer {
    user_id: String,
    api_key: String,
    client: reqwest::Client,
    endpoint: String,
    policy: RetryPolicy,
}

impl RemoteRenderer {
    pub fn new(
        user_id: impl Into<String>,
        api_key: impl Into<String>,
        policy: RetryPolicy,
    ) -> Result<Self, VslError> {
        let user_id = user_id.into();
        let api_key = api_key.into();
        if user_id.is_empty() || api_key.is_empty() {
            return Err(VslError::MissingCredential {
                provider: "htmlcsstoimage".into(),
                env_hint: "HCTI_USER_ID / HCTI_API_KEY".into(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| VslError::Http {
                service: "render".into(),
                detail: e.to_string(),
            })?;
        Ok(Self {
            user_id,
            api_key,
            client,
            endpoint: "https://hcti.io/v1/image".to_string(),
            policy,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SlideRenderer for RemoteRenderer {
    async fn render(&self, slide: &Slide) -> Result<Vec<u8>, VslError> {
        let html = slide_html(slide);
        let body = json!({
            "html": html,
            "viewport_width": RENDER_WIDTH,
            "viewport_height": RENDER_HEIGHT,
            "device_scale": 1,
        });

        let response = send_with_retry(
            || {
                self.client
                    .post(&self.endpoint)
                    .basic_auth(&self.user_id, Some(&self.api_key))
                    .json(&body)
            },
            &self.policy,
            "render",
        )
        .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(VslError::RenderFailed {
                ordinal: slide.ordinal,
                detail: format!("{status} {detail}"),
            });
        }

        let hosted: RenderResponse = response.json().await.map_err(|e| VslError::RenderFailed {
            ordinal: slide.ordinal,
            detail: e.to_string(),
        })?;

        let image = send_with_retry(|| self.client.get(&hosted.url), &self.policy, "render")
            .await?
            .bytes()
            .await
            .map_err(|e| VslError::RenderFailed {
                ordinal: slide.ordinal,
                detail: e.to_string(),
            })?;

        debug!("Rendered slide {} ({} bytes)", slide.ordinal, image.len());
        Ok(image.to_vec())
    }
}

// ── Data-URL decoding ────────────────────────────────────────────────────

static RE_DATA_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:[a-zA-Z0-9./+-]+;base64,(?<payload>.+)$").unwrap());

/// Decode a stored `data:*;base64,` URL back to raw bytes.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, String> {
    let captures = RE_DATA_URL
        .captures(url.trim())
        .ok_or_else(|| "not a base64 data-URL".to_string())?;
    BASE64
        .decode(&captures["payload"])
        .map_err(|e| e.to_string())
}

// ── ZIP packaging ────────────────────────────────────────────────────────

/// Render every slide and package PNGs (plus any MP3 narration) into a ZIP.
///
/// Entry names are `slide-NNN.png` / `slide-NNN.mp3`, numbered by ordinal
/// starting at 1 to match what the deck shows on screen.
pub async fn export_zip(
    slides: &[Slide],
    renderer: &dyn SlideRenderer,
) -> Result<Vec<u8>, VslError> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();

    for slide in slides {
        let number = slide.ordinal + 1;
        let png = renderer.render(slide).await?;
        zip.start_file(format!("slide-{number:03}.png"), options)
            .map_err(|e| VslError::ArchiveFailed(e.to_string()))?;
        zip.write_all(&png)
            .map_err(|e| VslError::ArchiveFailed(e.to_string()))?;

        if let Some(ref audio) = slide.audio {
            let mp3 = decode_data_url(&audio.url).map_err(|detail| VslError::BadAudioData {
                ordinal: slide.ordinal,
                detail,
            })?;
            zip.start_file(format!("slide-{number:03}.mp3"), options)
                .map_err(|e| VslError::ArchiveFailed(e.to_string()))?;
            zip.write_all(&mp3)
                .map_err(|e| VslError::ArchiveFailed(e.to_string()))?;
        }
    }

    let cursor = zip
        .finish()
        .map_err(|e| VslError::ArchiveFailed(e.to_string()))?;
    info!("Packaged {} slides into ZIP", slides.len());
    Ok(cursor.into_inner())
}

// ── Remote video composition ─────────────────────────────────────────────

/// One scene of the composed video.
#[derive(Debug, Clone)]
pub struct VideoScene {
    pub image_url: String,
    pub audio_url: Option<String>,
    /// Seconds this scene holds.
    pub duration: f64,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    project: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    movie: MovieStatus,
}

#[derive(Debug, Deserialize)]
struct MovieStatus {
    status: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Remote video-composition client (json2video-style API).
#[derive(Debug, Clone)]
pub struct VideoComposer {
    api_key: String,
    client: reqwest::Client,
    endpoint: String,
    policy: RetryPolicy,
}

impl VideoComposer {
    pub fn new(api_key: impl Into<String>, policy: RetryPolicy) -> Result<Self, VslError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(VslError::MissingCredential {
                provider: "json2video".into(),
                env_hint: "JSON2VIDEO_API_KEY".into(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| VslError::Http {
                service: "video".into(),
                detail: e.to_string(),
            })?;
        Ok(Self {
            api_key,
            client,
            endpoint: "https://api.json2video.com/v2/movies".to_string(),
            policy,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Submit a composition job, returning its job id.
    pub async fn submit(&self, scenes: &[VideoScene]) -> Result<String, VslError> {
        let body = job_spec(scenes);
        let response = send_with_retry(
            || {
                self.client
                    .post(&self.endpoint)
                    .header("x-api-key", &self.api_key)
                    .json(&body)
            },
            &self.policy,
            "video",
        )
        .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(VslError::Http {
                service: "video".into(),
                detail: format!("{status} {detail}"),
            });
        }

        let submitted: SubmitResponse = response.json().await.map_err(|e| VslError::Http {
            service: "video".into(),
            detail: e.to_string(),
        })?;
        info!("Video job submitted: {}", submitted.project);
        Ok(submitted.project)
    }

    /// Poll the job until it finishes, returning the movie URL.
    pub async fn wait_for_completion(&self, job_id: &str) -> Result<String, VslError> {
        let mut last_status = String::from("pending");
        for _ in 0..VIDEO_POLL_MAX_ATTEMPTS {
            sleep(Duration::from_secs(VIDEO_POLL_INTERVAL_SECS)).await;

            let response = send_with_retry(
                || {
                    self.client
                        .get(&self.endpoint)
                        .header("x-api-key", &self.api_key)
                        .query(&[("project", job_id)])
                },
                &self.policy,
                "video",
            )
            .await?;

            let parsed: StatusResponse = response.json().await.map_err(|e| VslError::Http {
                service: "video".into(),
                detail: e.to_string(),
            })?;

            match parsed.movie.status.as_str() {
                "done" => {
                    return parsed.movie.url.ok_or_else(|| VslError::VideoJobFailed {
                        job_id: job_id.to_string(),
                        detail: "job done but no movie URL".into(),
                    });
                }
                "error" => {
                    return Err(VslError::VideoJobFailed {
                        job_id: job_id.to_string(),
                        detail: parsed.movie.message.unwrap_or_else(|| "unknown".into()),
                    });
                }
                other => {
                    debug!("Video job {job_id}: {other}");
                    last_status = other.to_string();
                }
            }
        }

        Err(VslError::VideoJobTimedOut {
            job_id: job_id.to_string(),
            status: last_status,
            attempts: VIDEO_POLL_MAX_ATTEMPTS,
        })
    }

    /// Download the finished movie.
    pub async fn download(&self, movie_url: &str) -> Result<Vec<u8>, VslError> {
        let response =
            send_with_retry(|| self.client.get(movie_url), &self.policy, "video").await?;
        let bytes = response.bytes().await.map_err(|e| VslError::Http {
            service: "video".into(),
            detail: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

/// Build the composition body sent to the video service.
fn job_spec(scenes: &[VideoScene]) -> serde_json::Value {
    let scene_objects: Vec<serde_json::Value> = scenes
        .iter()
        .map(|scene| {
            let mut elements = vec![json!({
                "type": "image",
                "src": scene.image_url,
                "zoom": 0,
            })];
            if let Some(ref audio) = scene.audio_url {
                elements.push(json!({ "type": "audio", "src": audio }));
            }
            json!({
                "duration": scene.duration,
                "elements": elements,
            })
        })
        .collect();

    json!({
        "resolution": "full-hd",
        "width": RENDER_WIDTH,
        "height": RENDER_HEIGHT,
        "scenes": scene_objects,
    })
}

/// Turn reviewed slides into video scenes, using audio duration when known
/// and a reading-speed estimate otherwise.
pub fn scenes_from_slides(slides: &[Slide], image_urls: &[String]) -> Vec<VideoScene> {
    slides
        .iter()
        .zip(image_urls)
        .map(|(slide, image_url)| {
            let duration = slide
                .audio
                .as_ref()
                .map(|a| a.duration.max(1.0))
                .unwrap_or_else(|| crate::tts::estimate_duration_secs(&slide.full_script_text).max(2.0));
            VideoScene {
                image_url: image_url.clone(),
                audio_url: slide.audio.as_ref().map(|a| a.url.clone()),
                duration,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BackgroundImage, SlideAudio};
    use std::io::Read;

    struct StubRenderer;

    #[async_trait]
    impl SlideRenderer for StubRenderer {
        async fn render(&self, _slide: &Slide) -> Result<Vec<u8>, VslError> {
            Ok(vec![0x89, b'P', b'N', b'G'])
        }
    }

    fn slide(ordinal: usize) -> Slide {
        let mut s = Slide::from_text("Buy this now", None, None, None, None);
        s.ordinal = ordinal;
        s
    }

    #[test]
    fn data_url_round_trip() {
        let url = crate::tts::to_data_url(b"mp3 bytes here");
        assert_eq!(decode_data_url(&url).unwrap(), b"mp3 bytes here");
    }

    #[test]
    fn data_url_rejects_plain_urls() {
        assert!(decode_data_url("https://cdn/audio.mp3").is_err());
        assert!(decode_data_url("data:audio/mpeg;base64,@@@").is_err());
    }

    #[test]
    fn slide_html_contains_text_and_canvas() {
        let s = slide(0);
        let html = slide_html(&s);
        assert!(html.contains("Buy this now"));
        assert!(html.contains("width:1920px"));
        assert!(html.contains("height:1080px"));
    }

    #[test]
    fn slide_html_emphasises_words() {
        let mut s = slide(0);
        s.bold_words = vec!["this".into()];
        s.red_words = vec!["now".into()];
        let html = slide_html(&s);
        assert!(html.contains("<b>this</b>"));
        assert!(html.contains("#e11d48"));
    }

    #[test]
    fn slide_html_escapes_markup() {
        let mut s = slide(0);
        s.full_script_text = "a < b & c".into();
        let html = slide_html(&s);
        assert!(html.contains("a &lt; b &amp; c"));
    }

    #[test]
    fn slide_html_uses_background_image() {
        let mut s = slide(0);
        s.style.background = BackgroundKind::Image;
        s.has_background_image = true;
        s.background_image = Some(BackgroundImage {
            url: "https://img/bg.jpg".into(),
            opacity: 40,
            blur: 8,
            display_mode: Some(DisplayMode::Blurred),
            image_position_y: None,
        });
        let html = slide_html(&s);
        assert!(html.contains("url('https://img/bg.jpg')"));
        assert!(html.contains("blur(8px)"));
    }

    #[tokio::test]
    async fn export_zip_names_entries_by_ordinal() {
        let mut with_audio = slide(1);
        with_audio.audio = Some(SlideAudio {
            url: crate::tts::to_data_url(b"fake mp3"),
            duration: 2.0,
            generated: true,
        });
        let slides = vec![slide(0), with_audio];

        let bytes = export_zip(&slides, &StubRenderer).await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["slide-001.png", "slide-002.png", "slide-002.mp3"]
        );

        let mut mp3 = Vec::new();
        archive
            .by_name("slide-002.mp3")
            .unwrap()
            .read_to_end(&mut mp3)
            .unwrap();
        assert_eq!(mp3, b"fake mp3");
    }

    #[tokio::test]
    async fn export_zip_surfaces_bad_audio() {
        let mut s = slide(0);
        s.audio = Some(SlideAudio {
            url: "https://not-a-data-url/audio.mp3".into(),
            duration: 2.0,
            generated: true,
        });
        let err = export_zip(&[s], &StubRenderer).await.unwrap_err();
        assert!(matches!(err, VslError::BadAudioData { ordinal: 0, .. }));
    }

    #[test]
    fn scenes_prefer_audio_duration() {
        let mut with_audio = slide(0);
        with_audio.audio = Some(SlideAudio {
            url: crate::tts::to_data_url(b"x"),
            duration: 4.5,
            generated: true,
        });
        let without_audio = slide(1);
        let urls = vec!["https://a.png".to_string(), "https://b.png".to_string()];

        let scenes = scenes_from_slides(&[with_audio, without_audio], &urls);
        assert_eq!(scenes[0].duration, 4.5);
        assert!(scenes[0].audio_url.is_some());
        assert!(scenes[1].duration >= 2.0);
        assert!(scenes[1].audio_url.is_none());
    }

    #[test]
    fn job_spec_shape() {
        let scenes = vec![VideoScene {
            image_url: "https://a.png".into(),
            audio_url: Some("data:audio/mpeg;base64,QUJD".into()),
            duration: 3.0,
        }];
        let spec = job_spec(&scenes);
        assert_eq!(spec["width"], 1920);
        assert_eq!(spec["scenes"][0]["elements"][0]["type"], "image");
        assert_eq!(spec["scenes"][0]["elements"][1]["type"], "audio");
    }
}
