// Image storage for profile pictures, cover images and post images
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::validation::ValidationErrors;

pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Persist an image and return the URL it is served from.
    async fn store(&self, file_name: &str, bytes: Bytes) -> AppResult<String>;
}

pub type DynUploadStore = Arc<dyn UploadStore>;

/// Lowercased extension of an accepted image, or a validation error.
pub fn image_extension(file_name: &str) -> AppResult<String> {
    let rejected = || {
        AppError::Validation(ValidationErrors::single(
            "file",
            "Only jpg, jpeg and png images are allowed",
        ))
    };

    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(rejected)?;

    let is_image = mime_guess::from_ext(&ext)
        .first()
        .map_or(false, |mime| mime.type_() == mime_guess::mime::IMAGE);

    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) && is_image {
        Ok(ext)
    } else {
        Err(rejected())
    }
}

pub struct LocalUploadStore {
    root: PathBuf,
    public_url: String,
}

impl LocalUploadStore {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl UploadStore for LocalUploadStore {
    async fn store(&self, file_name: &str, bytes: Bytes) -> AppResult<String> {
        let ext = image_extension(file_name)?;
        if bytes.is_empty() {
            return Err(ValidationErrors::single("file", "Uploaded file is empty").into());
        }

        let name = format!("{}.{}", uuid::Uuid::now_v7(), ext);
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::Upload(e.to_string()))?;
        tokio::fs::write(self.root.join(&name), &bytes)
            .await
            .map_err(|e| AppError::Upload(e.to_string()))?;

        tracing::info!("Stored upload {} ({} bytes)", name, bytes.len());
        Ok(format!(
            "{}/uploads/{}",
            self.public_url.trim_end_matches('/'),
            name
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn accepts_only_jpeg_and_png() {
        assert_eq!(image_extension("me.JPG").unwrap(), "jpg");
        assert_eq!(image_extension("me.jpeg").unwrap(), "jpeg");
        assert_eq!(image_extension("me.png").unwrap(), "png");
        assert!(image_extension("me.gif").is_err());
        assert!(image_extension("me.txt").is_err());
        assert!(image_extension("noext").is_err());
    }

    #[tokio::test]
    async fn stores_file_and_returns_url() {
        let tmp = TempDir::new().unwrap();
        let store = LocalUploadStore::new(tmp.path().join("uploads"), "http://localhost:3000/");

        let url = store.store("cat.png", Bytes::from_static(b"\x89PNG")).await.unwrap();
        assert!(url.starts_with("http://localhost:3000/uploads/"));
        assert!(url.ends_with(".png"));

        let name = url.rsplit('/').next().unwrap();
        let written = std::fs::read(store.root().join(name)).unwrap();
        assert_eq!(written, b"\x89PNG");
    }

    #[tokio::test]
    async fn rejects_empty_upload() {
        let tmp = TempDir::new().unwrap();
        let store = LocalUploadStore::new(tmp.path(), "http://h");
        let err = store.store("cat.png", Bytes::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
