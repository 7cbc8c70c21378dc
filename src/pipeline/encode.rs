//! Image encoding: source file bytes → base64 [`EncodedImage`].
//!
//! The file is sent as-is rather than re-encoded: scans are usually already
//! PNG or JPEG, and re-compressing a JPEG only adds artefacts. The MIME type
//! is sniffed from the magic bytes because a `.jpg` that is really a PNG is
//! common after batch renames; the extension is only the fallback.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use std::path::Path;
use tracing::debug;

/// An image ready to embed in a JSON request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Standard base64, no line breaks.
    pub data: String,
    /// e.g. `image/png`.
    pub mime_type: String,
}

impl EncodedImage {
    /// Encode raw image bytes; `path` is only used for the MIME fallback.
    pub fn from_bytes(bytes: &[u8], path: &Path) -> Self {
        let mime_type = image::guess_format(bytes)
            .or_else(|_| ImageFormat::from_path(path))
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream")
            .to_string();
        Self {
            data: STANDARD.encode(bytes),
            mime_type,
        }
    }

    /// `data:` URL form used by OpenAI-compatible servers.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Read and encode an image from disk.
pub async fn encode_file(path: &Path) -> std::io::Result<EncodedImage> {
    let bytes = tokio::fs::read(path).await?;
    let encoded = EncodedImage::from_bytes(&bytes, path);
    debug!(
        "Encoded {} ({}) → {} bytes base64",
        path.display(),
        encoded.mime_type,
        encoded.data.len()
    );
    Ok(encoded)
}
