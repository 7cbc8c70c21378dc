//! Local text extraction: the fast, offline OCR pass.
//!
//! The engine is a black box behind [`TextExtractor`]. The shipped
//! implementation shells out to the `tesseract` CLI, which avoids linking
//! leptonica/tesseract into the binary and lets users pick any installed
//! language pack (including custom `.traineddata` files).

use crate::error::ExtractError;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Produces best-effort text for an image without touching the network.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Short engine name used in error messages.
    fn name(&self) -> &str;

    /// Extract text from the image at `path`.
    async fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Runs `tesseract <image> stdout -l <language>`.
#[derive(Debug, Clone)]
pub struct TesseractExtractor {
    binary: String,
    language: String,
}

impl TesseractExtractor {
    pub fn new(binary: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let output = Command::new(&self.binary)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .await
            .map_err(|source| ExtractError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExtractError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // Tesseract ends each page with a form feed.
        let text = String::from_utf8_lossy(&output.stdout).replace('\x0c', "");
        debug!("tesseract: {} chars from {}", text.len(), path.display());
        Ok(text)
    }
}
