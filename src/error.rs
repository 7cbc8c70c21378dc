//! Error types for the scanscribe library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`ScanError`] — **Fatal**: the batch cannot proceed at all (output
//!   directory cannot be created, a file cannot be written, bad config).
//!   Returned as `Err(ScanError)` from [`crate::batch::run_batch`].
//!
//! * [`RemoteError`] — **Per-item**: a call to the vision model failed
//!   (timeout, HTTP 500, malformed body). Carried inside
//!   [`crate::output::ItemArtifacts`] and flattened to text only when the
//!   item's files are written, so one bad image never aborts the batch.
//!
//! * [`ExtractError`] — **Per-item**: the local OCR engine failed. Handled
//!   the same way as `RemoteError`, and never retried.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All fatal errors returned by the scanscribe library.
///
/// Item-level failures use [`RemoteError`] / [`ExtractError`] and are
/// persisted as content rather than propagated here.
#[derive(Debug, Error)]
pub enum ScanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input directory could not be listed.
    #[error("Cannot read input directory '{path}': {source}")]
    InputDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The output directory does not exist and could not be created.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A per-item or corpus file could not be written.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted artifact exists but could not be read back.
    #[error("Failed to read output file '{path}': {source}")]
    OutputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No remote endpoint could be constructed.
    #[error("Remote endpoint is not configured.\n{hint}")]
    EndpointNotConfigured { hint: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a single remote model call failed.
///
/// `Timeout`, `Transport` and `Status` are transient and retried by
/// [`crate::pipeline::llm::call_with_retry`]; the rest are reported at once.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The call did not finish within the request timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection refused, reset, DNS failure and the like.
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// 2xx status but the body lacks the expected fields.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The source image could not be read for upload.
    #[error("cannot read image: {0}")]
    ImageUnreadable(String),

    /// Every attempt failed with a retryable error.
    #[error("gave up after {attempts} attempts, last error: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<RemoteError>,
    },
}

impl RemoteError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::Timeout(_) | RemoteError::Transport(_) | RemoteError::Status { .. }
        )
    }
}

/// A local OCR engine failure.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The engine binary could not be started.
    #[error("failed to run '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine ran but exited unsuccessfully.
    #[error("exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(RemoteError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(RemoteError::Transport("refused".into()).is_retryable());
        assert!(RemoteError::Status {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!RemoteError::Malformed("no content".into()).is_retryable());
        assert!(!RemoteError::ImageUnreadable("gone".into()).is_retryable());
    }

    #[test]
    fn exhausted_display_names_last_error() {
        let e = RemoteError::Exhausted {
            attempts: 3,
            last: Box::new(RemoteError::Status {
                status: 500,
                body: "boom".into(),
            }),
        };
        let msg = e.to_string();
        assert!(msg.contains("3 attempts"), "got: {msg}");
        assert!(msg.contains("HTTP 500"), "got: {msg}");
    }

    #[test]
    fn timeout_display() {
        let e = RemoteError::Timeout(Duration::from_millis(50));
        assert_eq!(e.to_string(), "request timed out after 50ms");
    }

    #[test]
    fn write_failed_display() {
        let e = ScanError::OutputWriteFailed {
            path: PathBuf::from("/out/a_ollama.txt"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.to_string().contains("a_ollama.txt"));
    }
}
