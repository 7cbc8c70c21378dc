//! Durable per-item output.
//!
//! Every file is written as UTF-8 to a sibling `.tmp` path and renamed over
//! the target, so each write fully replaces the previous content and a kill
//! mid-write never leaves a truncated `_ollama.txt` that the ledger would
//! take for a finished item.

use crate::config::PipelineMode;
use crate::error::ScanError;
use crate::output::{flatten_remote, ArtifactKind, ItemArtifacts};
use crate::pipeline::input::ImageItem;
use crate::pipeline::ledger::ItemLedger;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Replace `path` with `content` via temp file + rename.
pub async fn write_atomic(path: &Path, content: &str) -> Result<(), ScanError> {
    let failed = |source| ScanError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, content.as_bytes())
        .await
        .map_err(failed)?;
    tokio::fs::rename(&tmp, path).await.map_err(failed)?;

    debug!("Wrote {} ({} bytes)", path.display(), content.len());
    Ok(())
}

/// Persist `artifacts` for `item`, returning the paths written.
///
/// The intermediate file is written only in two-step mode. A missing final
/// result is written as an empty file so the item still reads as done.
pub async fn persist(
    ledger: &ItemLedger,
    item: &ImageItem,
    artifacts: &ItemArtifacts,
    mode: PipelineMode,
) -> Result<Vec<PathBuf>, ScanError> {
    let mut written = Vec::with_capacity(mode.artifact_kinds().len());

    for &kind in mode.artifact_kinds() {
        let content = match kind {
            ArtifactKind::Primary => artifacts.primary_text.clone(),
            ArtifactKind::RemoteIntermediate => {
                flatten_remote(&artifacts.remote_initial).into_owned()
            }
            ArtifactKind::RemoteFinal => artifacts
                .remote_final
                .as_ref()
                .map(|r| flatten_remote(r).into_owned())
                .unwrap_or_default(),
        };
        let path = ledger.artifact_path(item, kind);
        write_atomic(&path, &content).await?;
        written.push(path);
    }

    Ok(written)
}
