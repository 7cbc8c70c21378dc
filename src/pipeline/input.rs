//! Input enumeration: turn a directory listing into an ordered work list.
//!
//! Only regular files whose extension is on a fixed raster allow-list are
//! picked up, compared case-insensitively. The list is sorted by filename so
//! two runs over the same directory visit items in the same order, which is
//! what lets the aggregator and a resumed run agree on ordering.

use crate::error::ScanError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions accepted as input images (lower-case).
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// One unit of work: a source image and the name its outputs derive from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageItem {
    /// Full path to the source image.
    pub path: PathBuf,
    /// Source filename including extension, e.g. `page_01.PNG`.
    pub file_name: String,
    /// Filename without directory or extension, e.g. `page_01`.
    pub base_name: String,
}

impl ImageItem {
    /// Build an item from a path, or `None` if it is not an allowed image name.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        if !has_image_extension(&path) {
            return None;
        }
        let file_name = path.file_name()?.to_string_lossy().into_owned();
        let base_name = path.file_stem()?.to_string_lossy().into_owned();
        Some(Self {
            path,
            file_name,
            base_name,
        })
    }
}

/// Whether `path` ends in one of [`IMAGE_EXTENSIONS`], ignoring case.
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// List the images in `dir`, sorted by filename ascending.
///
/// Subdirectories are ignored, even if their names look like images.
pub async fn list_images(dir: &Path) -> Result<Vec<ImageItem>, ScanError> {
    let unreadable = |source| ScanError::InputDirUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(unreadable)?;
    let mut items = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        let file_type = match entry.file_type().await {
            Ok(t) => t,
            Err(_) => continue,
        };
        // Follow symlinks so a linked image still counts.
        let is_file = if file_type.is_symlink() {
            tokio::fs::metadata(entry.path())
                .await
                .map(|m| m.is_file())
                .unwrap_or(false)
        } else {
            file_type.is_file()
        };
        if !is_file {
            continue;
        }
        if let Some(item) = ImageItem::from_path(entry.path()) {
            items.push(item);
        }
    }

    items.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    debug!("Found {} images in {}", items.len(), dir.display());
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn extension_allow_list_is_case_insensitive() {
        assert!(has_image_extension(Path::new("a.png")));
        assert!(has_image_extension(Path::new("a.JPG")));
        assert!(has_image_extension(Path::new("scan.Jpeg")));
        assert!(!has_image_extension(Path::new("a.tiff")));
        assert!(!has_image_extension(Path::new("a.png.txt")));
        assert!(!has_image_extension(Path::new("png")));
    }

    #[test]
    fn base_name_strips_dir_and_extension() {
        let item = ImageItem::from_path("/scans/book/page_07.jpeg").unwrap();
        assert_eq!(item.file_name, "page_07.jpeg");
        assert_eq!(item.base_name, "page_07");
    }

    #[tokio::test]
    async fn listing_is_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["b.png", "a.png", "c.PNG", "notes.txt", "d.gif"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("folder.png")).unwrap();

        let items = list_images(dir.path()).await.unwrap();
        let names: Vec<_> = items.iter().map(|i| i.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.PNG"]);
    }

    #[tokio::test]
    async fn missing_dir_is_fatal() {
        let err = list_images(Path::new("/definitely/not/here")).await.unwrap_err();
        assert!(matches!(err, ScanError::InputDirUnreadable { .. }));
    }
}
