//! File storage
//!
//! Uploads are stored under a local directory, named by the SHA-256 of their
//! content, and served back as static files under the public prefix. Storing
//! the same bytes twice yields the same URL.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::config::StorageSettings;
use crate::domain::MessageKind;
use crate::shared::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("file is empty")]
    Empty,

    #[error("file exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Empty => AppError::BadRequest("No file provided".into()),
            StorageError::TooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            StorageError::Io(e) => AppError::Internal(format!("Upload storage failed: {e}")),
        }
    }
}

/// Reference to a stored upload.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoredFile {
    pub url: String,
    pub kind: MessageKind,
    pub size: usize,
    pub content_type: String,
    pub file_name: String,
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn store(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError>;
}

/// Coarse media kind from a MIME type.
pub fn media_kind(content_type: &str) -> MessageKind {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    if essence.starts_with("image/") {
        MessageKind::Image
    } else if essence.starts_with("video/") {
        MessageKind::Video
    } else {
        MessageKind::File
    }
}

/// Extensions a browser would render as active content from our origin.
const ACTIVE_EXTENSIONS: &[&str] = &[
    "htm", "html", "shtml", "xhtml", "xht", "svg", "svgz", "xml", "xsl", "xslt", "js", "mjs",
];

/// Lower-cased alphanumeric extension of a client file name, if any.
/// Active content types are stored without an extension and so are served as
/// `application/octet-stream`.
fn safe_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > 10 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    let ext = ext.to_ascii_lowercase();
    if ACTIVE_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    Some(ext)
}

/// Local directory storage.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
    public_prefix: String,
    max_bytes: usize,
}

impl LocalFileStorage {
    pub fn new(settings: &StorageSettings) -> Self {
        Self {
            root: PathBuf::from(&settings.upload_dir),
            public_prefix: settings.public_prefix.trim_end_matches('/').to_string(),
            max_bytes: settings.max_upload_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn store(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError> {
        if bytes.is_empty() {
            return Err(StorageError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(StorageError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let digest = format!("{:x}", Sha256::digest(bytes));
        let stored_name = match safe_extension(file_name) {
            Some(ext) => format!("{digest}.{ext}"),
            None => digest,
        };

        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(&stored_name);
        if tokio::fs::try_exists(&path).await? {
            debug!(%stored_name, "Upload already stored");
        } else {
            let tmp = self.root.join(format!(".{stored_name}.{}", uuid::Uuid::new_v4()));
            tokio::fs::write(&tmp, bytes).await?;
            tokio::fs::rename(&tmp, &path).await?;
        }

        Ok(StoredFile {
            url: format!("{}/{}", self.public_prefix, stored_name),
            kind: media_kind(content_type),
            size: bytes.len(),
            content_type: content_type.to_string(),
            file_name: file_name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn storage(dir: &Path, max: usize) -> LocalFileStorage {
        LocalFileStorage::new(&StorageSettings {
            upload_dir: dir.to_string_lossy().into_owned(),
            public_prefix: "/uploads/".into(),
            max_upload_bytes: max,
        })
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("spectr-storage-{}", uuid::Uuid::new_v4()))
    }

    #[test_case("image/png", MessageKind::Image ; "png")]
    #[test_case("video/mp4; codecs=avc1", MessageKind::Video ; "mp4 with params")]
    #[test_case("application/pdf", MessageKind::File ; "pdf")]
    fn test_media_kind(mime: &str, expected: MessageKind) {
        assert_eq!(media_kind(mime), expected);
    }

    #[test]
    fn test_extension_is_sanitised() {
        assert_eq!(safe_extension("Photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(safe_extension("../../etc/passwd"), None);
        assert_eq!(safe_extension("archive.tar.g$z"), None);
    }

    #[test_case("page.html" ; "html")]
    #[test_case("PAGE.HTM" ; "upper case htm")]
    #[test_case("logo.svg" ; "svg")]
    #[test_case("feed.xml" ; "xml")]
    fn test_active_extensions_are_dropped(name: &str) {
        assert_eq!(safe_extension(name), None);
    }

    #[tokio::test]
    async fn test_html_upload_stored_without_extension() {
        let dir = scratch_dir();
        let store = storage(&dir, 1024);

        let stored = store
            .store("evil.html", "text/html", b"<script>alert(1)</script>")
            .await
            .unwrap();

        let name = stored.url.trim_start_matches("/uploads/");
        assert!(!name.contains('.'));
        assert!(dir.join(name).exists());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_same_content_same_url() {
        let dir = scratch_dir();
        let store = storage(&dir, 1024);

        let a = store.store("a.png", "image/png", b"pixels").await.unwrap();
        let b = store.store("b.png", "image/png", b"pixels").await.unwrap();

        assert_eq!(a.url, b.url);
        assert!(a.url.starts_with("/uploads/"));
        assert_eq!(a.kind, MessageKind::Image);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected() {
        let store = storage(&scratch_dir(), 4);
        let err = store.store("big.bin", "application/octet-stream", b"12345").await.unwrap_err();
        assert!(matches!(err, StorageError::TooLarge { limit: 4 }));
    }
}
