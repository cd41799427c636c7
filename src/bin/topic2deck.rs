//! CLI binary for topic2deck.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GenerationConfig` and prints the build report.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use topic2deck::{
    generate, generate_to_file, GenerationConfig, GenerationProgressCallback, ModelPreference,
    ProgressCallback, TopicRequest, MAX_SLIDES, MIN_SLIDES,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar over the image-resolution stage
/// and per-slide log lines. Events arrive out of order in concurrent mode.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// The bar length is set by `on_run_start` once the outline is known.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix("Planning");
        bar.set_message("Waiting for the outline…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_run_start(&self, slide_count: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>2}/{len} slides  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        self.bar.set_length(slide_count as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Images");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Outline ready — resolving {slide_count} images…"))
        ));
    }

    fn on_image_start(&self, slide_num: usize, _total: usize) {
        self.bar.set_message(format!("slide {slide_num}"));
    }

    fn on_image_complete(&self, slide_num: usize, total: usize, fallback: bool) {
        let note = if fallback {
            dim("(broadened query)")
        } else {
            String::new()
        };
        self.bar.println(format!(
            "  {} Slide {:>2}/{:<2}  image resolved {}",
            green("✓"),
            slide_num,
            total,
            note
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, slide_num: usize, total: usize, error: String) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error
        };
        self.bar.println(format!(
            "  {} Slide {:>2}/{:<2}  {}",
            red("✗"),
            slide_num,
            total,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total: usize, resolved: usize) {
        let failed = total.saturating_sub(resolved);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} slide images resolved",
                green("✔"),
                bold(&resolved.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} slide images resolved  ({} without an image)",
                if resolved == 0 { red("✘") } else { cyan("⚠") },
                bold(&resolved.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Five slides on a topic, written next to you
  topic2deck "The Future of Renewable Energy"

  # Ten slides, faster model tier, explicit output file
  topic2deck --slides 10 --model fast "Remote Team Onboarding" -o onboarding.pptx

  # Text-only deck (no photo key required)
  topic2deck --no-images "Quarterly Review"

  # German deck with a closing slide
  topic2deck --language German --closing-slide "Elektromobilität"

  # Structured build report on stdout
  topic2deck --json "Supply Chain Risks" -o risks.pptx

MODEL TIERS:
  Tier       Model               Best for
  ────────   ─────────────────   ─────────────────────────────
  quality    gemini-2.5-pro      Default — best outlines
  balanced   gemini-2.5-flash    Good outlines, lower latency
  fast       gemini-1.5-flash    Short decks, quickest results

  The run falls back through the remaining tiers automatically when the
  preferred model is unavailable or persistently rate-limited.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY    Google AI Studio key (required)
  PEXELS_API_KEY    Pexels key (required unless --no-images)

SETUP:
  1. export GEMINI_API_KEY=...
  2. export PEXELS_API_KEY=...
  3. topic2deck "Your topic" -o deck.pptx
"#;

/// Generate PowerPoint presentations from a topic using generative AI.
#[derive(Parser, Debug)]
#[command(
    name = "topic2deck",
    version,
    about = "Generate PowerPoint presentations from a topic using generative AI",
    long_about = "Turn a free-text topic into a multi-slide .pptx: a generative-AI model plans \
the outline, a stock-photo service illustrates each slide, and the deck is assembled \
deterministically with a build report of anything that degraded along the way.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Presentation topic, e.g. "The Future of Renewable Energy".
    topic: String,

    /// Write the deck to this file instead of a topic-derived name.
    #[arg(short, long, env = "TOPIC2DECK_OUTPUT")]
    output: Option<PathBuf>,

    /// Number of content slides.
    #[arg(short, long, env = "TOPIC2DECK_SLIDES", default_value_t = 5)]
    slides: i64,

    /// Output language for headings, bullets, and notes.
    #[arg(short, long, env = "TOPIC2DECK_LANGUAGE", default_value = "English")]
    language: String,

    /// Model tier: quality, balanced, fast.
    #[arg(short, long, env = "TOPIC2DECK_MODEL", value_enum, default_value = "quality")]
    model: ModelArg,

    /// Skip stock photos; slides ship text-only.
    #[arg(long, env = "TOPIC2DECK_NO_IMAGES")]
    no_images: bool,

    /// Append a closing slide after the content slides.
    #[arg(long, env = "TOPIC2DECK_CLOSING_SLIDE")]
    closing_slide: bool,

    /// Concurrent image resolutions.
    #[arg(short, long, env = "TOPIC2DECK_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Outline retries after a malformed model response.
    #[arg(long, env = "TOPIC2DECK_RETRIES", default_value_t = 2)]
    retries: u32,

    /// Whole-run deadline in seconds.
    #[arg(long, env = "TOPIC2DECK_GLOBAL_TIMEOUT", default_value_t = 120)]
    global_timeout: u64,

    /// Timeout per outbound service call in seconds.
    #[arg(long, env = "TOPIC2DECK_API_TIMEOUT", default_value_t = 30)]
    api_timeout: u64,

    /// Minimum image resolution as WIDTHxHEIGHT.
    #[arg(long, env = "TOPIC2DECK_MIN_RESOLUTION", default_value = "1920x1080")]
    min_resolution: String,

    /// Print the build report as JSON on stdout.
    #[arg(long, env = "TOPIC2DECK_JSON")]
    json: bool,

    /// Print raw model responses to stderr after the run.
    #[arg(long, env = "TOPIC2DECK_DEBUG_RAW")]
    debug_raw: bool,

    /// Disable the progress bar.
    #[arg(long, env = "TOPIC2DECK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TOPIC2DECK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TOPIC2DECK_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum ModelArg {
    Quality,
    Balanced,
    Fast,
}

impl From<ModelArg> for ModelPreference {
    fn from(v: ModelArg) -> Self {
        match v {
            ModelArg::Quality => ModelPreference::Quality,
            ModelArg::Balanced => ModelPreference::Balanced,
            ModelArg::Fast => ModelPreference::Fast,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar provides the feedback that matters; suppress
    // INFO-level library logs while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build request + config ───────────────────────────────────────────
    let request = TopicRequest::new(cli.topic.clone(), cli.slides)
        .with_context(|| format!("Invalid request (slides must be {MIN_SLIDES}–{MAX_SLIDES})"))?
        .language(cli.language.clone())
        .model_preference(cli.model.clone().into());

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as ProgressCallback)
    } else {
        None
    };

    let config = build_config(&cli, progress)?;
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.pptx", slugify(&request.topic))));

    // ── Run ──────────────────────────────────────────────────────────────
    if cli.json || cli.debug_raw {
        let output = generate(&request, &config).await.context("Generation failed")?;

        tokio::fs::write(&output_path, &output.deck)
            .await
            .with_context(|| format!("Failed to write {}", output_path.display()))?;

        if let Some(raw) = &output.raw_model_output {
            for (i, response) in raw.iter().enumerate() {
                eprintln!("--- raw model response {} ---\n{}", i + 1, response);
            }
        }

        if cli.json {
            let json = serde_json::to_string_pretty(&output.report)
                .context("Failed to serialise build report")?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(json.as_bytes()).ok();
            stdout.write_all(b"\n").ok();
        } else if !cli.quiet {
            print_summary(&output.report, &output_path);
        }
    } else {
        let report = generate_to_file(&request, &output_path, &config)
            .await
            .context("Generation failed")?;
        if !cli.quiet {
            print_summary(&report, &output_path);
        }
    }

    Ok(())
}

fn print_summary(report: &topic2deck::BuildReport, path: &std::path::Path) {
    eprintln!(
        "{}  {} slides  {}ms  →  {}",
        if report.images_failed == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        report.slides_built,
        report.total_duration_ms,
        bold(&path.display().to_string()),
    );
    eprintln!(
        "   {} images resolved  /  {} without an image",
        dim(&report.images_resolved.to_string()),
        dim(&report.images_failed.to_string()),
    );
    for warning in &report.warnings {
        eprintln!("   {} {}", cyan("⚠"), dim(warning));
    }
}

/// Map CLI args to `GenerationConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GenerationConfig> {
    let (min_w, min_h) = parse_resolution(&cli.min_resolution)?;

    let mut builder = GenerationConfig::builder()
        .concurrency(cli.concurrency)
        .max_plan_retries(cli.retries)
        .global_timeout_secs(cli.global_timeout)
        .per_call_timeout_secs(cli.api_timeout)
        .image_min_resolution(min_w, min_h)
        .include_images(!cli.no_images)
        .closing_slide(cli.closing_slide)
        .debug_raw(cli.debug_raw);

    if let Some(cb) = progress {
        builder = builder.progress(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--min-resolution` ("1920x1080") into a width/height pair.
fn parse_resolution(s: &str) -> Result<(u32, u32)> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .with_context(|| format!("Invalid resolution '{s}', expected WIDTHxHEIGHT"))?;
    let width: u32 = w.trim().parse().context("Invalid resolution width")?;
    let height: u32 = h.trim().parse().context("Invalid resolution height")?;
    if width == 0 || height == 0 {
        anyhow::bail!("Resolution dimensions must be positive, got '{s}'");
    }
    Ok((width, height))
}

/// Topic → safe default filename stem.
fn slugify(topic: &str) -> String {
    let slug: String = topic
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let slug = slug.trim_matches('_').to_string();
    if slug.is_empty() {
        "deck".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_parses_both_separators() {
        assert_eq!(parse_resolution("1920x1080").unwrap(), (1920, 1080));
        assert_eq!(parse_resolution("1280X720").unwrap(), (1280, 720));
        assert!(parse_resolution("1920").is_err());
        assert!(parse_resolution("0x1080").is_err());
    }

    #[test]
    fn slugify_produces_safe_stems() {
        assert_eq!(slugify("The Future of Renewable Energy"), "the_future_of_renewable_energy");
        assert_eq!(slugify("Q1 / Q2 Review!"), "q1___q2_review");
        assert_eq!(slugify("???"), "deck");
    }
}
