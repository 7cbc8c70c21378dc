//! Corpus aggregation: one file per artifact kind across all items.
//!
//! The aggregator only reads what is on disk, in the item order it is given,
//! so it works the same after a full run, a resumed run, or a run killed
//! half-way. An item whose file is missing is simply left out.
//!
//! Entry format:
//!
//! ```text
//! --- page_01.png ---
//! <file content>
//!
//! ```
//!
//! Entries are joined with `\n`, which leaves a blank line between them.

use crate::config::PipelineMode;
use crate::error::ScanError;
use crate::output::ArtifactKind;
use crate::pipeline::input::ImageItem;
use crate::pipeline::ledger::ItemLedger;
use crate::pipeline::writer::write_atomic;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

/// Corpus kinds written for `mode`: final and primary always, intermediate
/// in two-step mode.
pub fn corpus_kinds(mode: PipelineMode) -> &'static [ArtifactKind] {
    match mode {
        PipelineMode::SingleStep => &[ArtifactKind::RemoteFinal, ArtifactKind::Primary],
        PipelineMode::TwoStep => &[
            ArtifactKind::RemoteFinal,
            ArtifactKind::Primary,
            ArtifactKind::RemoteIntermediate,
        ],
    }
}

/// Build the corpus text for one artifact kind.
pub async fn build_corpus(
    ledger: &ItemLedger,
    items: &[ImageItem],
    kind: ArtifactKind,
) -> Result<(String, usize), ScanError> {
    let mut entries = Vec::with_capacity(items.len());

    for item in items {
        let path = ledger.artifact_path(item, kind);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(source) => return Err(ScanError::OutputReadFailed { path, source }),
        };
        let content = String::from_utf8_lossy(&bytes);
        entries.push(format!("--- {} ---\n{}\n", item.file_name, content));
    }

    let count = entries.len();
    Ok((entries.join("\n"), count))
}

/// Write every corpus file for `mode`, returning their paths.
pub async fn aggregate(
    ledger: &ItemLedger,
    items: &[ImageItem],
    mode: PipelineMode,
) -> Result<Vec<PathBuf>, ScanError> {
    let mut written = Vec::new();

    for &kind in corpus_kinds(mode) {
        let (corpus, count) = build_corpus(ledger, items, kind).await?;
        let path = ledger.output_dir().join(kind.corpus_file_name());
        write_atomic(&path, &corpus).await?;
        debug!("{}: {} of {} items", path.display(), count, items.len());
        written.push(path);
    }

    info!(
        "Aggregated {} items into {} corpus files",
        items.len(),
        written.len()
    );
    Ok(written)
}
