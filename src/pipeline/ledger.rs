//! Resume bookkeeping derived from the output directory.
//!
//! Nothing survives a restart in memory, so the ledger reads item state
//! straight from the artifact files. An item is done if and only if its
//! final file exists; the other files only describe partial progress.

use crate::output::ArtifactKind;
use crate::pipeline::input::ImageItem;
use std::path::{Path, PathBuf};

/// Where an item stands according to the files on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// No artifact files at all.
    Pending,
    /// Some artifact files, but no final transcription.
    Partial,
    /// Final transcription present. The item is skipped.
    Done,
}

/// Which artifact files exist for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemRecord {
    pub has_primary: bool,
    pub has_intermediate: bool,
    pub has_final: bool,
}

impl ItemRecord {
    pub fn status(&self) -> ItemStatus {
        if self.has_final {
            ItemStatus::Done
        } else if self.has_primary || self.has_intermediate {
            ItemStatus::Partial
        } else {
            ItemStatus::Pending
        }
    }
}

/// Per-item status view over an output directory.
#[derive(Debug, Clone)]
pub struct ItemLedger {
    output_dir: PathBuf,
}

impl ItemLedger {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of `kind` for `item` in this ledger's directory.
    pub fn artifact_path(&self, item: &ImageItem, kind: ArtifactKind) -> PathBuf {
        kind.path_in(&self.output_dir, &item.base_name)
    }

    async fn exists(&self, item: &ImageItem, kind: ArtifactKind) -> bool {
        tokio::fs::try_exists(self.artifact_path(item, kind))
            .await
            .unwrap_or(false)
    }

    /// Current file presence for `item`.
    pub async fn record(&self, item: &ImageItem) -> ItemRecord {
        ItemRecord {
            has_primary: self.exists(item, ArtifactKind::Primary).await,
            has_intermediate: self.exists(item, ArtifactKind::RemoteIntermediate).await,
            has_final: self.exists(item, ArtifactKind::RemoteFinal).await,
        }
    }

    /// True iff the final-output file for `item` exists.
    pub async fn is_done(&self, item: &ImageItem) -> bool {
        self.exists(item, ArtifactKind::RemoteFinal).await
    }
}
