//! Batch orchestration: walk the input directory and drive every item.
//!
//! Items run strictly one after another in filename order. Each item's pass
//! is self-contained: ledger check, local extraction, remote turns, then the
//! files hit disk before the next item starts. After the loop the aggregator
//! runs once over the full item list, skipped items included, so the corpus
//! always reflects the whole output directory.

use crate::config::{BatchConfig, PipelineMode};
use crate::error::ScanError;
use crate::output::{
    flatten_extract, is_flattened_remote_error, ArtifactKind, BatchSummary, ItemArtifacts,
};
use crate::pipeline::extract::{TesseractExtractor, TextExtractor};
use crate::pipeline::input::{self, ImageItem};
use crate::pipeline::ledger::{ItemLedger, ItemRecord, ItemStatus};
use crate::pipeline::llm::{HttpEndpoint, RemoteClient, VisionEndpoint};
use crate::pipeline::{aggregate, writer};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Transcribe every image in `input_dir` into `output_dir`.
///
/// # Returns
/// `Ok(BatchSummary)` once all items are visited and the corpus files are
/// written, even if some items ended with error text.
///
/// # Errors
/// Returns `Err(ScanError)` only for fatal errors:
/// - input directory cannot be listed
/// - output directory cannot be created, or a file cannot be written
/// - invalid endpoint configuration
pub async fn run_batch(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchSummary, ScanError> {
    let started = Instant::now();
    let input_dir = input_dir.as_ref();
    let output_dir = output_dir.as_ref();
    info!(
        "Starting batch: {} → {} ({:?})",
        input_dir.display(),
        output_dir.display(),
        config.mode
    );

    // ── Step 1: Prepare output directory ─────────────────────────────────
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|source| ScanError::OutputDirCreateFailed {
            path: output_dir.to_path_buf(),
            source,
        })?;

    // ── Step 2: Enumerate items ──────────────────────────────────────────
    let items = input::list_images(input_dir).await?;
    let total = items.len();
    info!("Found {} images", total);
    debug!(
        "Worst case per item: {:?} ({} remote calls × {} attempts)",
        config.retry.worst_case() * config.mode.remote_calls(),
        config.mode.remote_calls(),
        config.retry.max_attempts
    );

    // ── Step 3: Wire up collaborators ────────────────────────────────────
    let progress: ProgressCallback = config
        .progress_callback
        .clone()
        .unwrap_or_else(|| Arc::new(NoopProgressCallback));
    let extractor = resolve_extractor(config);
    let client = RemoteClient::new(resolve_endpoint(config)?, config.retry)
        .with_ocr_hint(config.ocr_hint)
        .with_progress(Arc::clone(&progress));
    let ledger = ItemLedger::new(output_dir);
    let pass = ItemPass {
        config,
        ledger: &ledger,
        extractor: extractor.as_ref(),
        client: &client,
    };

    progress.on_batch_start(total);
    let mut summary = BatchSummary {
        total,
        ..Default::default()
    };

    // ── Step 4: Per-item pipeline ────────────────────────────────────────
    for (i, item) in items.iter().enumerate() {
        let index = i + 1;
        if ledger.is_done(item).await {
            info!("[{}/{}] {}: already done, skipping", index, total, item.file_name);
            progress.on_item_skipped(index, total, &item.file_name);
            summary.skipped += 1;
            continue;
        }

        let record = ledger.record(item).await;
        if record.status() == ItemStatus::Partial {
            debug!("{}: partial output from an earlier run", item.file_name);
        }

        info!("[{}/{}] {}: processing", index, total, item.file_name);
        progress.on_item_start(index, total, &item.file_name);

        let (artifacts, extract_failed) = pass.run(item, record).await?;
        writer::persist(&ledger, item, &artifacts, config.mode).await?;

        summary.processed += 1;
        if extract_failed {
            summary.extraction_failures += 1;
        }
        let remote_ok = artifacts.remote_ok();
        if !remote_ok {
            summary.remote_failures += 1;
        }
        progress.on_item_complete(index, total, &item.file_name, remote_ok);
    }

    // ── Step 5: Aggregate ────────────────────────────────────────────────
    let corpus_files = aggregate::aggregate(&ledger, &items, config.mode).await?;
    progress.on_aggregate_complete(&corpus_files);
    summary.corpus_files = corpus_files;
    summary.duration_ms = started.elapsed().as_millis() as u64;

    info!(
        "Batch complete: {} processed, {} skipped, {} remote failures, {}ms",
        summary.processed, summary.skipped, summary.remote_failures, summary.duration_ms
    );
    progress.on_batch_complete(&summary);

    Ok(summary)
}

/// Synchronous wrapper around [`run_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_batch_sync(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchSummary, ScanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ScanError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_batch(input_dir, output_dir, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Pre-built endpoint if the caller supplied one, else HTTP from config.
fn resolve_endpoint(config: &BatchConfig) -> Result<Arc<dyn VisionEndpoint>, ScanError> {
    if let Some(ref endpoint) = config.endpoint {
        return Ok(Arc::clone(endpoint));
    }
    let endpoint = HttpEndpoint::from_config(config)?;
    debug!("Using HTTP endpoint {}", endpoint.name());
    Ok(Arc::new(endpoint))
}

fn resolve_extractor(config: &BatchConfig) -> Arc<dyn TextExtractor> {
    match config.extractor {
        Some(ref extractor) => Arc::clone(extractor),
        None => Arc::new(TesseractExtractor::new(
            &config.tesseract_binary,
            &config.ocr_language,
        )),
    }
}

/// Everything one item's pass needs, borrowed from the run.
struct ItemPass<'a> {
    config: &'a BatchConfig,
    ledger: &'a ItemLedger,
    extractor: &'a dyn TextExtractor,
    client: &'a RemoteClient,
}

impl ItemPass<'_> {
    /// Produce the artifacts for one not-yet-done item.
    ///
    /// The returned flag is true when local extraction failed.
    async fn run(
        &self,
        item: &ImageItem,
        record: ItemRecord,
    ) -> Result<(ItemArtifacts, bool), ScanError> {
        let saved_initial = if self.config.reuse_intermediate
            && self.config.mode == PipelineMode::TwoStep
            && record.has_intermediate
        {
            self.read_saved(item, ArtifactKind::RemoteIntermediate)
                .await?
                .filter(|text| {
                    let usable = !is_flattened_remote_error(text);
                    if !usable {
                        info!(
                            "{}: saved intermediate is an error message, redoing first turn",
                            item.file_name
                        );
                    }
                    usable
                })
        } else {
            None
        };

        let (primary_text, extract_failed) = match (&saved_initial, record.has_primary) {
            (Some(_), true) => match self.read_saved(item, ArtifactKind::Primary).await? {
                Some(text) => (text, false),
                None => self.extract(item).await,
            },
            _ => self.extract(item).await,
        };

        let artifacts = match saved_initial {
            Some(initial) => {
                info!("{}: reusing saved intermediate transcription", item.file_name);
                let refined = self
                    .client
                    .refine_saved(item, &primary_text, &initial)
                    .await;
                ItemArtifacts {
                    primary_text,
                    remote_initial: Ok(initial),
                    remote_final: Some(refined),
                }
            }
            None => {
                let outcome = self
                    .client
                    .process(item, &primary_text, self.config.mode)
                    .await;
                let remote_final = outcome
                    .refined
                    .unwrap_or_else(|| outcome.initial.clone());
                ItemArtifacts {
                    primary_text,
                    remote_initial: outcome.initial,
                    remote_final: Some(remote_final),
                }
            }
        };

        Ok((artifacts, extract_failed))
    }

    /// Local extraction, flattened: failures become the text itself.
    async fn extract(&self, item: &ImageItem) -> (String, bool) {
        match self.extractor.extract(&item.path).await {
            Ok(text) => (text, false),
            Err(e) => {
                warn!("{}: local extraction failed — {}", item.file_name, e);
                (flatten_extract(self.extractor.name(), &e), true)
            }
        }
    }

    /// Read a previously written artifact; `None` if missing or blank.
    async fn read_saved(
        &self,
        item: &ImageItem,
        kind: ArtifactKind,
    ) -> Result<Option<String>, ScanError> {
        let path = self.ledger.artifact_path(item, kind);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                Ok((!text.trim().is_empty()).then_some(text))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ScanError::OutputReadFailed { path, source }),
        }
    }
}
