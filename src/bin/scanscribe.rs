//! CLI binary for scanscribe.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `BatchConfig` and prints the run summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use scanscribe::{
    run_batch, ApiFlavor, BatchConfig, BatchProgressCallback, BatchSummary, PipelineMode,
    ProgressCallback,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar at the bottom, one log line per item.
struct CliProgressCallback {
    bar: ProgressBar,
    retries: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Scanning");
        bar.set_message("Listing images…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            retries: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_items: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  ETA {eta_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_items as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Transcribing");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {total_items} images"))
        ));
    }

    fn on_item_start(&self, _index: usize, _total: usize, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_item_skipped(&self, index: usize, total: usize, name: &str) {
        self.bar.println(format!(
            "  {} {:>4}/{:<4} {}  {}",
            dim("↷"),
            index,
            total,
            name,
            dim("already done")
        ));
        self.bar.inc(1);
    }

    fn on_attempt_failed(&self, name: &str, attempt: u32, max_attempts: u32, error: &str) {
        self.retries.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {}  attempt {}/{}  {}",
            yellow("↻"),
            name,
            attempt,
            max_attempts,
            dim(&msg)
        ));
    }

    fn on_item_complete(&self, index: usize, total: usize, name: &str, remote_ok: bool) {
        let mark = if remote_ok { green("✓") } else { red("✗") };
        self.bar
            .println(format!("  {} {:>4}/{:<4} {}", mark, index, total, name));
        self.bar.inc(1);
    }

    fn on_aggregate_complete(&self, corpus_files: &[PathBuf]) {
        self.bar.finish_and_clear();
        let retries = self.retries.load(Ordering::SeqCst);
        if retries > 0 {
            eprintln!("{} {} failed remote attempts", yellow("↻"), retries);
        }
        for path in corpus_files {
            eprintln!("{} {}", cyan("◆"), dim(&path.display().to_string()));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Single-step transcription with a local Ollama server
  scanscribe -i scans/ -o out/

  # Two-step: reconcile the model's reading with tesseract's
  scanscribe -i scans/ -o out/ --two-step --lang fas

  # LM Studio (OpenAI-compatible) on its default port
  scanscribe -i scans/ -o out/ --flavor openai --model gemma-3-27b-it

  # Resume an interrupted two-step run without repeating first answers
  scanscribe -i scans/ -o out/ --two-step --reuse-intermediate

OUTPUT (per image `page.png`):
  page_tesseract.txt             local OCR text
  page_ollama_intermediate.txt   first model answer (--two-step only)
  page_ollama.txt                final transcription; its presence marks the image done
  all_tesseract_results.txt      corpus of all local OCR text
  all_ollama_results.txt         corpus of all final transcriptions

Re-running with the same directories skips finished images.
"#;

/// Transcribe scanned images with tesseract and a vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "scanscribe",
    version,
    about = "Transcribe a directory of scanned images with tesseract and a vision LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory containing png/jpg/jpeg images.
    #[arg(short, long, env = "SCANSCRIBE_INPUT")]
    input: PathBuf,

    /// Directory for per-image text files and corpus files.
    #[arg(short, long, env = "SCANSCRIBE_OUTPUT")]
    output: PathBuf,

    /// Refine the model's answer against tesseract output in a second turn.
    #[arg(long, env = "SCANSCRIBE_TWO_STEP")]
    two_step: bool,

    /// Server API shape.
    #[arg(long, env = "SCANSCRIBE_FLAVOR", value_enum, default_value = "ollama-chat")]
    flavor: FlavorArg,

    /// Server base URL. Default depends on --flavor.
    #[arg(long, env = "SCANSCRIBE_ENDPOINT")]
    endpoint: Option<String>,

    /// Vision model ID.
    #[arg(long, env = "SCANSCRIBE_MODEL")]
    model: Option<String>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "SCANSCRIBE_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Attempts per remote call, including the first.
    #[arg(long, env = "SCANSCRIBE_MAX_ATTEMPTS", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: u32,

    /// Per-attempt timeout in seconds.
    #[arg(long, env = "SCANSCRIBE_TIMEOUT", default_value_t = 300,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Pause between attempts in seconds.
    #[arg(long, env = "SCANSCRIBE_RETRY_DELAY", default_value_t = 5)]
    retry_delay: u64,

    /// tesseract executable.
    #[arg(long, env = "SCANSCRIBE_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// tesseract language(s), e.g. eng, fas, eng+deu.
    #[arg(long, env = "SCANSCRIBE_LANG", default_value = "eng")]
    lang: String,

    /// Include tesseract output in the first prompt as a reference.
    #[arg(long, env = "SCANSCRIBE_OCR_HINT")]
    ocr_hint: bool,

    /// With --two-step, reuse saved first answers for unfinished images.
    #[arg(long, env = "SCANSCRIBE_REUSE_INTERMEDIATE", requires = "two_step")]
    reuse_intermediate: bool,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SCANSCRIBE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SCANSCRIBE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SCANSCRIBE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FlavorArg {
    OllamaChat,
    OllamaGenerate,
    Openai,
}

impl From<FlavorArg> for ApiFlavor {
    fn from(v: FlavorArg) -> Self {
        match v {
            FlavorArg::OllamaChat => ApiFlavor::OllamaChat,
            FlavorArg::OllamaGenerate => ApiFlavor::OllamaGenerate,
            FlavorArg::Openai => ApiFlavor::OpenAi,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose asks for them.
    let show_progress = !cli.quiet && !cli.no_progress;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    let summary = run_batch(&cli.input, &cli.output, &config)
        .await
        .context("Batch failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    }
    if !cli.quiet {
        print_summary(&summary);
    }

    Ok(())
}

/// Map CLI args to `BatchConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BatchConfig> {
    let mut builder = BatchConfig::builder()
        .mode(if cli.two_step {
            PipelineMode::TwoStep
        } else {
            PipelineMode::SingleStep
        })
        .flavor(cli.flavor.into())
        .temperature(cli.temperature)
        .max_attempts(cli.max_attempts)
        .request_timeout(Duration::from_secs(cli.timeout))
        .retry_delay(Duration::from_secs(cli.retry_delay))
        .tesseract_binary(&cli.tesseract)
        .ocr_language(&cli.lang)
        .ocr_hint(cli.ocr_hint)
        .reuse_intermediate(cli.reuse_intermediate);

    if let Some(ref url) = cli.endpoint {
        builder = builder.endpoint_url(url);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(summary: &BatchSummary) {
    let mark = if summary.remote_failures == 0 {
        green("✔")
    } else {
        yellow("⚠")
    };
    eprintln!(
        "{} {} processed, {} skipped of {} images  {}",
        mark,
        bold(&summary.processed.to_string()),
        summary.skipped,
        summary.total,
        dim(&format!("{:.1}s", summary.duration_ms as f64 / 1000.0)),
    );
    if summary.remote_failures > 0 {
        eprintln!(
            "   {} items hold an error message instead of a transcription",
            red(&summary.remote_failures.to_string())
        );
    }
    if summary.extraction_failures > 0 {
        eprintln!(
            "   {} items had local OCR failures",
            red(&summary.extraction_failures.to_string())
        );
    }
}
