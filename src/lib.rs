//! # scanscribe
//!
//! Batch-transcribe a directory of scanned document images by combining a
//! fast local OCR pass (tesseract) with a vision-capable language model.
//!
//! ## Why two engines?
//!
//! Tesseract is quick and runs offline but stumbles on noisy scans, mixed
//! scripts, and unusual fonts. A vision LLM reads those far better but is
//! slow and occasionally drops or invents lines. In two-step mode the model
//! is shown its own transcription next to tesseract's and asked to reconcile
//! them, which catches omissions on both sides.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input dir
//!  │
//!  ├─ 1. List     png/jpg/jpeg, sorted by filename
//!  ├─ 2. Resume   skip items whose `{base}_ollama.txt` exists
//!  ├─ 3. Extract  local OCR → `{base}_tesseract.txt`
//!  ├─ 4. VLM      transcribe (and refine) with retry → `{base}_ollama.txt`
//!  └─ 5. Corpus   `all_ollama_results.txt`, `all_tesseract_results.txt`
//! ```
//!
//! Killing the process loses at most the item in flight; the next run picks
//! up where the last one stopped.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scanscribe::{run_batch, BatchConfig, PipelineMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BatchConfig::builder()
//!         .mode(PipelineMode::TwoStep)
//!         .ocr_language("fas")
//!         .build()?;
//!     let summary = run_batch("scans/", "out/", &config).await?;
//!     eprintln!("{} processed, {} skipped", summary.processed, summary.skipped);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scanscribe` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{run_batch, run_batch_sync};
pub use config::{ApiFlavor, BatchConfig, BatchConfigBuilder, PipelineMode, RetryPolicy};
pub use error::{ExtractError, RemoteError, ScanError};
pub use output::{ArtifactKind, BatchSummary, ItemArtifacts, RemoteText};
pub use pipeline::extract::{TesseractExtractor, TextExtractor};
pub use pipeline::input::ImageItem;
pub use pipeline::llm::{HttpEndpoint, VisionEndpoint};
pub use pipeline::wire::Conversation;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
