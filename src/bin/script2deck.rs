//! CLI binary for script2deck.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GenerationConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use script2deck::{
    AnthropicModel, CancelToken, ElevenLabsClient, FallbackModel, GenerationConfig,
    GenerationProgressCallback, LanguageModel, OpenAiModel, PexelsClient, Phase, Pipeline,
    PixabayClient, ProgressCallback,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI definition ───────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "script2deck",
    version,
    about = "Turn a VSL script into a styled slide deck"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log filter, e.g. "script2deck=debug".
    #[arg(long, global = true, default_value = "warn")]
    log: String,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a deck from a script file and write it as JSON.
    Generate {
        /// Path to the script text file.
        script: PathBuf,

        /// Output path for the deck JSON (stdout if omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Free-text art direction passed to the style stage.
        #[arg(long)]
        style: Option<String>,

        /// Model for the split/keyword/infographic stages.
        #[arg(long)]
        fast_model: Option<String>,

        /// Model for the style stage.
        #[arg(long)]
        style_model: Option<String>,

        /// Concurrent split-stage LLM calls.
        #[arg(long, default_value_t = 3)]
        split_concurrency: usize,

        /// Concurrent style-stage LLM calls.
        #[arg(long, default_value_t = 5)]
        style_concurrency: usize,

        /// Anthropic API key.
        #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
        anthropic_key: String,

        /// OpenAI API key; enables the LLM fallback path when set.
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        openai_key: Option<String>,

        /// Pexels API key (primary stock-photo provider).
        #[arg(long, env = "PEXELS_API_KEY", hide_env_values = true)]
        pexels_key: String,

        /// Pixabay API key (secondary stock-photo provider).
        #[arg(long, env = "PIXABAY_API_KEY", hide_env_values = true)]
        pixabay_key: String,
    },

    /// List the available text-to-speech voices.
    Voices {
        /// ElevenLabs API key.
        #[arg(long, env = "ELEVENLABS_API_KEY", hide_env_values = true)]
        elevenlabs_key: String,
    },
}

// ── Progress callback ────────────────────────────────────────────────────────

/// Terminal progress: one bar per phase, swapped on phase transitions.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl GenerationProgressCallback for CliProgress {
    fn on_phase(&self, phase: Phase) {
        self.bar.set_prefix(match phase {
            Phase::Splitting => "Splitting script",
            Phase::Styling => "Styling slides",
            Phase::ResolvingImages => "Resolving images",
            Phase::Enriching => "Enriching infographics",
            Phase::Done => "Done",
            _ => "",
        });
        self.bar.set_message("");
    }

    fn on_batch(&self, _phase: Phase, completed: usize, total: usize, fallback: bool) {
        let note = if fallback { " (fallback)" } else { "" };
        self.bar.set_message(format!("batch {completed}/{total}{note}"));
    }

    fn on_slide_resolved(&self, completed: usize, total: usize, _resolved: bool) {
        self.bar.set_message(format!("image {completed}/{total}"));
    }

    fn on_complete(&self, total_slides: usize, image_slides: usize) {
        self.bar.finish_and_clear();
        println!(
            "{} {}",
            green("✓"),
            bold(&format!(
                "{total_slides} slides generated, {image_slides} with images"
            ))
        );
    }
}

// ── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Generate {
            script,
            output,
            style,
            fast_model,
            style_model,
            split_concurrency,
            style_concurrency,
            anthropic_key,
            openai_key,
            pexels_key,
            pixabay_key,
        } => {
            let text = std::fs::read_to_string(&script)
                .with_context(|| format!("reading script file {}", script.display()))?;

            let progress: ProgressCallback = CliProgress::new();
            let mut builder = GenerationConfig::builder()
                .split_concurrency(split_concurrency)
                .style_concurrency(style_concurrency)
                .progress_callback(progress);
            if let Some(style) = style {
                builder = builder.style_directive(style);
            }
            if let Some(model) = fast_model {
                builder = builder.fast_model(model);
            }
            if let Some(model) = style_model {
                builder = builder.style_model(model);
            }
            let config = builder.build()?;

            let anthropic = AnthropicModel::new(anthropic_key, config.api_timeout_secs)?;
            let llm: Arc<dyn LanguageModel> = match openai_key {
                Some(key) if !key.is_empty() => {
                    let openai = OpenAiModel::new(key, config.api_timeout_secs)?;
                    Arc::new(FallbackModel::new(Arc::new(anthropic), Arc::new(openai)))
                }
                _ => Arc::new(anthropic),
            };

            let pipeline = Pipeline::new(
                llm,
                Arc::new(PexelsClient::new(pexels_key, 30)?),
                Arc::new(PixabayClient::new(pixabay_key, 30)?),
                config,
            );

            eprintln!("{} {}", cyan("◆"), bold("Generating deck…"));
            let result = pipeline.generate(&text, &CancelToken::new()).await?;

            let json = serde_json::to_string_pretty(&result.slides)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!(
                        "{} Deck written to {} {}",
                        green("✓"),
                        path.display(),
                        dim(&format!(
                            "({} fallback batches, {}ms)",
                            result.stats.fallback_batches, result.stats.total_ms
                        ))
                    );
                }
                None => println!("{json}"),
            }
        }

        Command::Voices { elevenlabs_key } => {
            let client = ElevenLabsClient::new(elevenlabs_key, 30)?;
            let voices = client.voices().await?;
            for voice in voices {
                println!(
                    "{}  {}{}",
                    bold(&voice.voice_id),
                    voice.name,
                    voice
                        .category
                        .map(|c| dim(&format!("  ({c})")))
                        .unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}
