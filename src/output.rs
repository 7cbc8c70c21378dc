//! Per-item artifacts, on-disk naming, and the run summary.
//!
//! Remote results travel through the pipeline as [`RemoteText`], a typed
//! `Result`. They become plain text only in [`flatten_remote`], which the
//! writer calls at the persistence boundary. The files on disk therefore
//! hold either a transcription or a readable error message, while the code
//! in between can still tell the two apart.

use crate::error::{ExtractError, RemoteError};
use serde::Serialize;
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Outcome of one remote model turn.
pub type RemoteText = Result<String, RemoteError>;

/// The kinds of per-item file the pipeline writes.
///
/// Filenames are a pure function of the base-name and the kind, so re-runs
/// over the same directories always hit the same paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArtifactKind {
    /// Local OCR output. Named `_tesseract` whatever engine is plugged in.
    Primary,
    /// The model's first answer, kept for audit in two-step mode.
    RemoteIntermediate,
    /// The authoritative transcription. Its presence marks an item done.
    RemoteFinal,
}

impl ArtifactKind {
    fn suffix(self) -> &'static str {
        match self {
            ArtifactKind::Primary => "tesseract",
            ArtifactKind::RemoteIntermediate => "ollama_intermediate",
            ArtifactKind::RemoteFinal => "ollama",
        }
    }

    /// `{base_name}_{suffix}.txt`
    pub fn file_name(self, base_name: &str) -> String {
        format!("{base_name}_{}.txt", self.suffix())
    }

    /// Full path of this artifact for `base_name` inside `output_dir`.
    pub fn path_in(self, output_dir: &Path, base_name: &str) -> PathBuf {
        output_dir.join(self.file_name(base_name))
    }

    /// Name of the corpus file that concatenates this kind across items.
    pub fn corpus_file_name(self) -> String {
        format!("all_{}_results.txt", self.suffix())
    }
}

/// Everything produced for one item during its pipeline pass.
#[derive(Debug, Clone)]
pub struct ItemArtifacts {
    /// Local OCR text, or a flattened extraction error.
    pub primary_text: String,
    /// Result of the first remote turn.
    pub remote_initial: RemoteText,
    /// Authoritative result. Equals `remote_initial` in single-step mode.
    pub remote_final: Option<RemoteText>,
}

impl ItemArtifacts {
    /// Whether the final transcription came from the model rather than an error.
    pub fn remote_ok(&self) -> bool {
        matches!(self.remote_final, Some(Ok(_)))
    }
}

/// Leading text of a flattened [`RemoteError::Malformed`].
pub const MALFORMED_PREFIX: &str = "Error parsing remote model response: ";
/// Leading text of every other flattened [`RemoteError`].
pub const REMOTE_ERROR_PREFIX: &str = "Error processing image with remote model: ";

/// Render a remote result as file content.
pub fn flatten_remote(result: &RemoteText) -> Cow<'_, str> {
    match result {
        Ok(text) => Cow::Borrowed(text.as_str()),
        Err(RemoteError::Malformed(detail)) => Cow::Owned(format!("{MALFORMED_PREFIX}{detail}")),
        Err(e) => Cow::Owned(format!("{REMOTE_ERROR_PREFIX}{e}")),
    }
}

/// Whether saved file content is a flattened remote error rather than a
/// transcription.
pub fn is_flattened_remote_error(content: &str) -> bool {
    content.starts_with(MALFORMED_PREFIX) || content.starts_with(REMOTE_ERROR_PREFIX)
}

/// Render a local extraction failure as file content.
pub fn flatten_extract(engine: &str, err: &ExtractError) -> String {
    format!("Error extracting text with {engine}: {err}")
}

/// Counts and paths reported at the end of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    /// Images found in the input directory.
    pub total: usize,
    /// Items run through the pipeline this time.
    pub processed: usize,
    /// Items skipped because their final file already existed.
    pub skipped: usize,
    /// Processed items whose final text is an error message.
    pub remote_failures: usize,
    /// Processed items whose local extraction failed.
    pub extraction_failures: usize,
    /// Corpus files written by the aggregator.
    pub corpus_files: Vec<PathBuf>,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
}
