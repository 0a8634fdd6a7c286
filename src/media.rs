use std::path::{Path, PathBuf};

use mime_guess::mime::{self, Mime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("file is empty")]
    Empty,

    #[error("not an image: {0}")]
    NotAnImage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Public URL for a stored file path relative to the media root.
pub fn url_for(relative: &str) -> String {
    format!("/media/{}", relative)
}

/// Uploaded avatars and post images, stored as plain files under one root
/// and served read-only at `/media`.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store an image under `dir`, returning its path relative to the root.
    pub async fn save_image(
        &self,
        dir: &str,
        file_name: Option<&str>,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        let mime = image_mime(file_name, content_type)?;
        let ext = mime_guess::get_mime_extensions(&mime)
            .and_then(|exts| exts.first())
            .copied()
            .unwrap_or("img");

        let relative = format!("{}/{}.{}", dir, uuid::Uuid::now_v7(), ext);
        let path = self.root.join(&relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(relative)
    }

    pub async fn remove(&self, relative: &str) -> Result<(), MediaError> {
        tokio::fs::remove_file(self.root.join(relative)).await?;
        Ok(())
    }
}

/// Declared content type wins; otherwise guess from the file name.
fn image_mime(file_name: Option<&str>, content_type: Option<&str>) -> Result<Mime, MediaError> {
    let is_image = |m: &Mime| m.type_() == mime::IMAGE;
    content_type
        .and_then(|c| c.parse::<Mime>().ok())
        .filter(is_image)
        .or_else(|| {
            file_name
                .and_then(|name| mime_guess::from_path(name).first())
                .filter(is_image)
        })
        .ok_or_else(|| {
            MediaError::NotAnImage(
                content_type
                    .or(file_name)
                    .unwrap_or("unknown")
                    .to_string(),
            )
        })
}
